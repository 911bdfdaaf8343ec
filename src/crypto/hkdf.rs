//! HKDF-SHA256 derivation used by the Noise symmetric state.
//!
//! Thin shims over the `hkdf` crate, shaped for the handshake's needs:
//! extract-and-expand into a caller-provided buffer, and the 64-byte
//! two-key split that both `mix_key` and the final cipher split perform.

use hkdf::Hkdf;
use sha2::Sha256;

/// HKDF-SHA256 extract-then-expand, filling `okm`.
pub fn derive_into(salt: Option<&[u8]>, ikm: &[u8], info: &[u8], okm: &mut [u8]) {
    Hkdf::<Sha256>::new(salt, ikm)
        .expand(info, okm)
        .expect("output length within HKDF-SHA256 bounds");
}

/// Derive a 64-byte block from `salt`/`ikm` and split it into two 32-byte
/// keys.
pub fn derive_pair(salt: &[u8; 32], ikm: &[u8]) -> ([u8; 32], [u8; 32]) {
    let mut okm = [0u8; 64];
    derive_into(Some(&salt[..]), ikm, b"", &mut okm);

    let (first, second) = okm.split_at(32);
    (
        first.try_into().expect("left half is 32 bytes"),
        second.try_into().expect("right half is 32 bytes"),
    )
}
