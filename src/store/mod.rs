//! Session store interface.
//!
//! The Signal layer (double ratchet, prekey bundles) lives behind this
//! trait; the transport core only needs session existence checks, prekey
//! persistence during registration, and the encrypt entry point consumed by
//! higher layers. An in-memory implementation ships for development and
//! tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::KeyPair;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A one-time prekey persisted during registration.
#[derive(Debug, Clone)]
pub struct PreKeyRecord {
    pub id: u32,
    pub key_pair: KeyPair,
}

/// Signal session store owned by the auth state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whether a ratchet session exists for `(user, device_id)`.
    async fn contains_session(&self, user: &str, device_id: u32) -> StoreResult<bool>;

    /// Persist a generated one-time prekey.
    async fn store_pre_key(&self, id: u32, record: PreKeyRecord) -> StoreResult<()>;

    /// Encrypt `plaintext` for `recipient`, returning the ciphertext type
    /// tag and bytes. Used by higher layers when sending messages.
    async fn encrypt(&self, plaintext: &[u8], recipient: &str)
        -> StoreResult<(String, Vec<u8>)>;
}

/// In-memory store for development and testing.
pub struct MemoryStore {
    sessions: RwLock<HashMap<(String, u32), Vec<u8>>>,
    pre_keys: RwLock<HashMap<u32, PreKeyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            pre_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Record a raw session blob, mainly useful in tests.
    pub fn put_session(&self, user: &str, device_id: u32, record: Vec<u8>) {
        self.sessions
            .write()
            .expect("session lock")
            .insert((user.to_string(), device_id), record);
    }

    pub fn pre_key_count(&self) -> usize {
        self.pre_keys.read().expect("prekey lock").len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn contains_session(&self, user: &str, device_id: u32) -> StoreResult<bool> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(sessions.contains_key(&(user.to_string(), device_id)))
    }

    async fn store_pre_key(&self, id: u32, record: PreKeyRecord) -> StoreResult<()> {
        let mut pre_keys = self
            .pre_keys
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        pre_keys.insert(id, record);
        Ok(())
    }

    async fn encrypt(
        &self,
        _plaintext: &[u8],
        _recipient: &str,
    ) -> StoreResult<(String, Vec<u8>)> {
        Err(StoreError::Unsupported("signal encryption"))
    }
}
