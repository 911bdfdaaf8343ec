//! Cryptographic primitives for the transport core: key pairs and Signal
//! signatures, HKDF, the AEAD cipher state, and the Noise handshake.

mod cipher;
mod hkdf;
mod keypair;
mod noise;

pub use cipher::{CipherError, CipherState};
pub use hkdf::{derive_into, derive_pair};
pub use keypair::{djb_encode, verify_signature, KeyPair, SignedPreKey};
pub use noise::{HandshakeState, NoiseError, WaSymmetricState};
