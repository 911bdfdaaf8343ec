//! Curve25519 key pairs: X25519 agreement plus Signal-style signatures.
//!
//! Identity keys sign with the XEd25519 construction: the Montgomery scalar
//! is lifted to an Ed25519 key whose public point has sign bit zero, so a
//! plain Ed25519 verify works once the Montgomery public key is converted
//! back to Edwards form.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::constants::DJB_KEY_TYPE;

/// A Curve25519 key pair.
#[derive(Clone)]
pub struct KeyPair {
    /// Public key (32 bytes)
    pub public: [u8; 32],
    /// Private key (32 bytes)
    pub private: [u8; 32],
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut private = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut private);
        clamp(&mut private);
        Self::from_private_key(private)
    }

    /// Create a key pair from an existing private key.
    pub fn from_private_key(private: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret);

        Self {
            public: *public.as_bytes(),
            private,
        }
    }

    /// Perform X25519 Diffie-Hellman key agreement.
    pub fn dh(&self, their_public: &[u8; 32]) -> [u8; 32] {
        let secret = StaticSecret::from(self.private);
        let their_key = PublicKey::from(*their_public);
        *secret.diffie_hellman(&their_key).as_bytes()
    }

    /// Sign a message with this key, XEd25519-style.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let mut scalar_bytes = self.private;
        clamp(&mut scalar_bytes);
        let mut a = Scalar::from_bytes_mod_order(scalar_bytes);
        let mut point = EdwardsPoint::mul_base(&a);
        // Force sign bit zero so the verifier can reconstruct the point.
        if point.compress().as_bytes()[31] & 0x80 != 0 {
            a = -a;
            point = -point;
        }
        let public = point.compress().to_bytes();

        let mut h = Sha512::new();
        h.update(self.private);
        h.update(message);
        let digest: [u8; 64] = h.finalize().into();
        let r = Scalar::from_bytes_mod_order_wide(&digest);
        let big_r = EdwardsPoint::mul_base(&r).compress();

        let mut h = Sha512::new();
        h.update(big_r.as_bytes());
        h.update(public);
        h.update(message);
        let digest: [u8; 64] = h.finalize().into();
        let k = Scalar::from_bytes_mod_order_wide(&digest);

        let s = r + k * a;
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(big_r.as_bytes());
        signature[32..].copy_from_slice(s.as_bytes());
        signature
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

fn clamp(key: &mut [u8; 32]) {
    key[0] &= 248;
    key[31] &= 127;
    key[31] |= 64;
}

/// Verify a signature made by a Curve25519 key over `message`.
///
/// The Montgomery public key is lifted to Edwards form with the sign carried
/// in bit 7 of signature byte 63 (cleared before the Ed25519 verify).
pub fn verify_signature(public: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let sign_bit = (signature[63] & 0x80) >> 7;
    let point = match MontgomeryPoint(*public).to_edwards(sign_bit) {
        Some(point) => point,
        None => return false,
    };
    let verifying_key = match VerifyingKey::from_bytes(&point.compress().to_bytes()) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let mut sig = *signature;
    sig[63] &= 0x7f;
    verifying_key
        .verify(message, &Signature::from_bytes(&sig))
        .is_ok()
}

/// A signed prekey: key pair plus the identity signature over its public key.
#[derive(Clone, Debug)]
pub struct SignedPreKey {
    pub id: u32,
    pub key_pair: KeyPair,
    pub signature: [u8; 64],
}

impl SignedPreKey {
    /// Generate a prekey with the given id, signed by the identity key.
    pub fn generate(id: u32, identity: &KeyPair) -> Self {
        let key_pair = KeyPair::generate();
        let signature = identity.sign(&djb_encode(&key_pair.public));
        Self {
            id,
            key_pair,
            signature,
        }
    }
}

/// Type-prefixed public key encoding used by the Signal layer.
pub fn djb_encode(public: &[u8; 32]) -> [u8; 33] {
    let mut out = [0u8; 33];
    out[0] = DJB_KEY_TYPE;
    out[1..].copy_from_slice(public);
    out
}
