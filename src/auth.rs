//! Persistent per-device identity.
//!
//! An `AuthState` is created once, threaded into the session at
//! construction, and mutated only by the connection (pairing fills in `me`
//! and the signed device identity) and by the store. It can be snapshotted
//! to JSON so an embedding app survives restarts without re-pairing.

use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{KeyPair, SignedPreKey};
use crate::proto::SignedDeviceIdentity;
use crate::store::SessionStore;
use crate::types::Jid;

/// The account record populated after a successful pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Me {
    pub jid: Jid,
}

#[derive(Clone)]
pub struct AuthState {
    /// Static Noise key identifying this device to the gateway.
    pub noise_key: KeyPair,
    /// Signal identity key.
    pub identity_key: KeyPair,
    /// Current signed prekey.
    pub signed_prekey: SignedPreKey,
    pub registration_id: u32,
    /// Companion secret embedded in the pairing QR string.
    pub adv_secret: [u8; 32],
    /// Populated only after a successful pairing.
    pub me: Option<Me>,
    /// Device identity record delivered by the server at pairing.
    pub signed_device_identity: Option<SignedDeviceIdentity>,
    /// Next one-time prekey id to generate.
    pub next_prekey_id: u32,
    /// Opaque Signal store used by higher layers.
    pub store: Arc<dyn SessionStore>,
}

impl AuthState {
    /// Fresh, unpaired identity.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let identity_key = KeyPair::generate();
        let signed_prekey = SignedPreKey::generate(1, &identity_key);
        let mut adv_secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut adv_secret);

        Self {
            noise_key: KeyPair::generate(),
            identity_key,
            signed_prekey,
            // Registration ids are 14-bit by convention.
            registration_id: rand::thread_rng().next_u32() & 0x3FFF,
            adv_secret,
            me: None,
            signed_device_identity: None,
            next_prekey_id: 1,
            store,
        }
    }

    /// Whether this device has paired before.
    pub fn is_registered(&self) -> bool {
        self.me.is_some()
    }

    /// `user@server` form of the stored JID, once paired.
    pub fn self_jid(&self) -> Option<Jid> {
        self.me.as_ref().map(|me| me.jid.to_non_ad())
    }

    /// Serialize the identity (keys base64-encoded, store excluded).
    pub fn to_json(&self) -> Result<String, AuthPersistError> {
        let snapshot = AuthSnapshot {
            noise_private: b64(&self.noise_key.private),
            identity_private: b64(&self.identity_key.private),
            signed_prekey_id: self.signed_prekey.id,
            signed_prekey_private: b64(&self.signed_prekey.key_pair.private),
            signed_prekey_signature: b64(&self.signed_prekey.signature),
            registration_id: self.registration_id,
            adv_secret: b64(&self.adv_secret),
            me_jid: self.me.as_ref().map(|me| me.jid.to_string()),
            device_identity: self.signed_device_identity.as_ref().map(|identity| {
                DeviceIdentitySnapshot {
                    details: b64(identity.details.as_deref().unwrap_or_default()),
                    account_signature: b64(identity.account_signature.as_deref().unwrap_or_default()),
                    account_signature_key: b64(
                        identity.account_signature_key.as_deref().unwrap_or_default(),
                    ),
                    device_signature: b64(identity.device_signature.as_deref().unwrap_or_default()),
                }
            }),
            next_prekey_id: self.next_prekey_id,
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Restore a previously serialized identity onto the given store.
    pub fn from_json(json: &str, store: Arc<dyn SessionStore>) -> Result<Self, AuthPersistError> {
        let snapshot: AuthSnapshot = serde_json::from_str(json)?;

        let identity_key = KeyPair::from_private_key(key32(&snapshot.identity_private)?);
        let signed_prekey = SignedPreKey {
            id: snapshot.signed_prekey_id,
            key_pair: KeyPair::from_private_key(key32(&snapshot.signed_prekey_private)?),
            signature: key64(&snapshot.signed_prekey_signature)?,
        };
        let me = snapshot
            .me_jid
            .map(|jid| {
                jid.parse()
                    .map(|jid| Me { jid })
                    .map_err(|e| AuthPersistError::Invalid(format!("stored jid: {e}")))
            })
            .transpose()?;
        let signed_device_identity = snapshot
            .device_identity
            .map(|identity| -> Result<_, AuthPersistError> {
                Ok(SignedDeviceIdentity {
                    details: Some(unb64(&identity.details)?),
                    account_signature: Some(unb64(&identity.account_signature)?),
                    account_signature_key: Some(unb64(&identity.account_signature_key)?),
                    device_signature: Some(unb64(&identity.device_signature)?),
                })
            })
            .transpose()?;

        Ok(Self {
            noise_key: KeyPair::from_private_key(key32(&snapshot.noise_private)?),
            identity_key,
            signed_prekey,
            registration_id: snapshot.registration_id,
            adv_secret: key32(&snapshot.adv_secret)?,
            me,
            signed_device_identity,
            next_prekey_id: snapshot.next_prekey_id,
            store,
        })
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("registration_id", &self.registration_id)
            .field("me", &self.me)
            .field("next_prekey_id", &self.next_prekey_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum AuthPersistError {
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid auth snapshot: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize)]
struct AuthSnapshot {
    noise_private: String,
    identity_private: String,
    signed_prekey_id: u32,
    signed_prekey_private: String,
    signed_prekey_signature: String,
    registration_id: u32,
    adv_secret: String,
    me_jid: Option<String>,
    device_identity: Option<DeviceIdentitySnapshot>,
    next_prekey_id: u32,
}

#[derive(Serialize, Deserialize)]
struct DeviceIdentitySnapshot {
    details: String,
    account_signature: String,
    account_signature_key: String,
    device_signature: String,
}

fn b64(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode(bytes)
}

fn unb64(value: &str) -> Result<Vec<u8>, AuthPersistError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD
        .decode(value)
        .map_err(|e| AuthPersistError::Invalid(format!("base64: {e}")))
}

fn key32(value: &str) -> Result<[u8; 32], AuthPersistError> {
    unb64(value)?
        .try_into()
        .map_err(|_| AuthPersistError::Invalid("expected 32 bytes".into()))
}

fn key64(value: &str) -> Result<[u8; 64], AuthPersistError> {
    unb64(value)?
        .try_into()
        .map_err(|_| AuthPersistError::Invalid("expected 64 bytes".into()))
}
