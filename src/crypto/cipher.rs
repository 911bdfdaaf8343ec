//! AES-256-GCM cipher state: one key, one monotonically increasing nonce.
//!
//! Both handshake and transport encryption go through this type. The GCM IV
//! is four zero bytes followed by the 64-bit counter big-endian; the counter
//! advances once per seal/open and must never wrap.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("nonce counter exhausted")]
    NonceExhausted,
}

/// One direction of AEAD state.
pub struct CipherState {
    cipher: Aes256Gcm,
    nonce: u64,
}

impl CipherState {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new_from_slice(&key).expect("32-byte AES-256 key"),
            nonce: 0,
        }
    }

    /// Frames sealed or opened so far.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Encrypt `plaintext`, consuming the next nonce.
    pub fn seal(&mut self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let iv = self.next_iv()?;
        self.cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: ad,
                },
            )
            .map_err(|_| CipherError::EncryptionFailed)
    }

    /// Decrypt `ciphertext`, consuming the next nonce.
    pub fn open(&mut self, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let iv = self.next_iv()?;
        self.cipher
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: ciphertext,
                    aad: ad,
                },
            )
            .map_err(|_| CipherError::DecryptionFailed)
    }

    fn next_iv(&mut self) -> Result<[u8; 12], CipherError> {
        if self.nonce == u64::MAX {
            return Err(CipherError::NonceExhausted);
        }
        let mut iv = [0u8; 12];
        iv[4..].copy_from_slice(&self.nonce.to_be_bytes());
        self.nonce += 1;
        Ok(iv)
    }
}

impl std::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherState")
            .field("nonce", &self.nonce)
            .finish()
    }
}
