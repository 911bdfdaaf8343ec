//! Noise XX over X25519/AES-GCM/SHA-256 with the vendor symmetric state.
//!
//! The symmetric state deviates from stock Noise in two ways that must be
//! matched bit-exactly: a protocol name longer or shorter than the hash
//! length is hashed rather than padded, and the handshake AEAD is keyed with
//! the initial hash from the start. Handshake encryption uses the running
//! transcript hash as associated data; each `mix_key` re-keys the AEAD and
//! restarts its nonce counter.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::constants::{NOISE_PROTOCOL_NAME, PROLOGUE};
use crate::crypto::cipher::{CipherError, CipherState};
use crate::crypto::hkdf::derive_pair;
use crate::crypto::keypair::KeyPair;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoiseError {
    #[error("peer key has wrong length")]
    BadKeyLength,
    #[error("handshake message out of order")]
    OutOfOrder,
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Symmetric handshake state: transcript hash, chaining key, handshake AEAD.
pub struct WaSymmetricState {
    h: [u8; 32],
    ck: [u8; 32],
    aead: CipherState,
}

impl WaSymmetricState {
    pub fn new(protocol_name: &[u8], prologue: &[u8]) -> Self {
        let mut h = [0u8; 32];
        if protocol_name.len() == 32 {
            h.copy_from_slice(protocol_name);
        } else {
            h = Sha256::digest(protocol_name).into();
        }

        let mut state = Self {
            h,
            ck: h,
            aead: CipherState::new(h),
        };
        state.mix_hash(prologue);
        state
    }

    pub fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h = hasher.finalize().into();
    }

    /// Fold DH output into the chaining key and re-key the handshake AEAD,
    /// restarting its nonce counter.
    pub fn mix_key(&mut self, ikm: &[u8]) {
        let (ck, key) = derive_pair(&self.ck, ikm);
        self.ck = ck;
        self.aead = CipherState::new(key);
    }

    pub fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, NoiseError> {
        let ciphertext = self.aead.seal(&self.h, plaintext)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, NoiseError> {
        let plaintext = self.aead.open(&self.h, ciphertext)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Derive the one-way transport ciphers. The initiator sends with the
    /// first and receives with the second.
    pub fn split(&self) -> (CipherState, CipherState) {
        let (write, read) = derive_pair(&self.ck, &[]);
        (CipherState::new(write), CipherState::new(read))
    }

    pub fn handshake_hash(&self) -> &[u8; 32] {
        &self.h
    }

    #[cfg(test)]
    fn chaining_key(&self) -> &[u8; 32] {
        &self.ck
    }
}

/// Initiator-side XX handshake: `(e)`, `(e, ee, s, es)`, `(s, se)`.
pub struct HandshakeState {
    symmetric: WaSymmetricState,
    s: KeyPair,
    e: KeyPair,
    rs: Option<[u8; 32]>,
    re: Option<[u8; 32]>,
}

impl HandshakeState {
    /// Start a handshake with the persistent static Noise key.
    pub fn initiate(static_key: KeyPair) -> Self {
        Self::with_ephemeral(static_key, KeyPair::generate())
    }

    pub(crate) fn with_ephemeral(static_key: KeyPair, ephemeral: KeyPair) -> Self {
        Self {
            symmetric: WaSymmetricState::new(NOISE_PROTOCOL_NAME, &PROLOGUE),
            s: static_key,
            e: ephemeral,
            rs: None,
            re: None,
        }
    }

    /// `-> e`: mixes the ephemeral into the transcript and returns it. The
    /// ephemeral travels in plaintext; there is no message-1 payload.
    pub fn write_client_hello(&mut self) -> [u8; 32] {
        self.symmetric.mix_hash(&self.e.public);
        self.e.public
    }

    /// `<- e, ee, s, es`: processes the server hello parts and returns the
    /// decrypted certificate payload.
    pub fn read_server_hello(
        &mut self,
        ephemeral: &[u8],
        static_ciphertext: &[u8],
        payload_ciphertext: &[u8],
    ) -> Result<Vec<u8>, NoiseError> {
        let re: [u8; 32] = ephemeral.try_into().map_err(|_| NoiseError::BadKeyLength)?;
        self.symmetric.mix_hash(&re);
        self.re = Some(re);

        self.symmetric.mix_key(&self.e.dh(&re));
        let static_plain = self.symmetric.decrypt_and_hash(static_ciphertext)?;
        let rs: [u8; 32] = static_plain
            .as_slice()
            .try_into()
            .map_err(|_| NoiseError::BadKeyLength)?;
        self.rs = Some(rs);

        self.symmetric.mix_key(&self.e.dh(&rs));
        self.symmetric.decrypt_and_hash(payload_ciphertext)
    }

    /// `-> s, se`: returns the encrypted static key (48 bytes) and the
    /// encrypted payload for the ClientFinish message.
    pub fn write_client_finish(
        &mut self,
        payload: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), NoiseError> {
        let re = self.re.ok_or(NoiseError::OutOfOrder)?;
        let static_ciphertext = self.symmetric.encrypt_and_hash(&self.s.public)?;
        self.symmetric.mix_key(&self.s.dh(&re));
        let payload_ciphertext = self.symmetric.encrypt_and_hash(payload)?;
        Ok((static_ciphertext, payload_ciphertext))
    }

    /// Server static key proposed during the handshake.
    pub fn remote_static(&self) -> Option<&[u8; 32]> {
        self.rs.as_ref()
    }

    /// Consume the handshake, yielding `(send, recv)` transport ciphers.
    pub fn finish(self) -> (CipherState, CipherState) {
        self.symmetric.split()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hkdf::derive_into;

    #[test]
    fn initial_hash_is_the_padded_pattern_name() {
        let state = WaSymmetricState::new(NOISE_PROTOCOL_NAME, b"");
        assert_eq!(&state.h[..], NOISE_PROTOCOL_NAME);
        assert_eq!(&state.ck[..], NOISE_PROTOCOL_NAME);
    }

    #[test]
    fn short_pattern_name_is_hashed() {
        let state = WaSymmetricState::new(b"Noise_XX", b"");
        let expected: [u8; 32] = Sha256::digest(b"Noise_XX").into();
        assert_eq!(state.h, expected);
    }

    #[test]
    fn prologue_is_mixed_into_the_transcript() {
        let state = WaSymmetricState::new(NOISE_PROTOCOL_NAME, &PROLOGUE);

        let mut hasher = Sha256::new();
        hasher.update(NOISE_PROTOCOL_NAME);
        hasher.update(PROLOGUE);
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(state.h, expected);
        // The chaining key is untouched by prologue mixing.
        assert_eq!(&state.ck[..], NOISE_PROTOCOL_NAME);
    }

    #[test]
    fn mix_key_follows_the_hkdf_chain() {
        let mut state = WaSymmetricState::new(NOISE_PROTOCOL_NAME, &PROLOGUE);
        let ikm = [0x5a; 32];
        let ck_before = *state.chaining_key();
        let mut expected = [0u8; 64];
        derive_into(Some(&ck_before[..]), &ikm, b"", &mut expected);

        state.mix_key(&ikm);

        assert_eq!(state.chaining_key()[..], expected[..32]);
    }

    #[test]
    fn handshake_encryption_binds_the_transcript_hash() {
        let mut a = WaSymmetricState::new(NOISE_PROTOCOL_NAME, &PROLOGUE);
        let mut b = WaSymmetricState::new(NOISE_PROTOCOL_NAME, &PROLOGUE);
        b.mix_hash(b"divergent transcript");

        let secret = [0x77; 32];
        a.mix_key(&secret);
        b.mix_key(&secret);

        let sealed = a.encrypt_and_hash(b"payload").unwrap();
        assert!(b.decrypt_and_hash(&sealed).is_err());
    }

    // Fixed-key transcript: the client state must agree, step by step and
    // byte for byte, with a responder driven directly through the symmetric
    // primitives, and the split ciphers must interoperate.
    #[test]
    fn fixed_key_transcript_agrees_with_reference_responder() {
        let client_static = KeyPair::from_private_key([0x11; 32]);
        let client_ephemeral = KeyPair::from_private_key([0x22; 32]);
        let server_static = KeyPair::from_private_key([0x33; 32]);
        let server_ephemeral = KeyPair::from_private_key([0x44; 32]);

        let mut client =
            HandshakeState::with_ephemeral(client_static.clone(), client_ephemeral.clone());
        let mut server = WaSymmetricState::new(NOISE_PROTOCOL_NAME, &PROLOGUE);

        // -> e
        let ephemeral_pub = client.write_client_hello();
        assert_eq!(ephemeral_pub, client_ephemeral.public);
        server.mix_hash(&ephemeral_pub);

        // <- e, ee, s, es
        server.mix_hash(&server_ephemeral.public);
        server.mix_key(&server_ephemeral.dh(&ephemeral_pub));
        let static_ct = server.encrypt_and_hash(&server_static.public).unwrap();
        assert_eq!(static_ct.len(), 48);
        server.mix_key(&server_static.dh(&ephemeral_pub));
        let payload_ct = server.encrypt_and_hash(b"certificate bytes").unwrap();

        let cert = client
            .read_server_hello(&server_ephemeral.public, &static_ct, &payload_ct)
            .unwrap();
        assert_eq!(cert, b"certificate bytes");
        assert_eq!(client.remote_static(), Some(&server_static.public));
        assert_eq!(client.symmetric.handshake_hash(), server.handshake_hash());

        // -> s, se
        let (finish_static, finish_payload) =
            client.write_client_finish(b"client payload").unwrap();
        assert_eq!(finish_static.len(), 48);

        let opened_static = server.decrypt_and_hash(&finish_static).unwrap();
        assert_eq!(opened_static, client_static.public);
        server.mix_key(&server_ephemeral.dh(&client_static.public));
        let opened_payload = server.decrypt_and_hash(&finish_payload).unwrap();
        assert_eq!(opened_payload, b"client payload");
        assert_eq!(client.symmetric.handshake_hash(), server.handshake_hash());
        assert_eq!(client.symmetric.chaining_key(), server.chaining_key());

        // Transport ciphers: initiator's send key is the responder's first
        // split key too, so the directions cross over.
        let (mut client_send, mut client_recv) = client.finish();
        let (mut server_recv, mut server_send) = server.split();

        let frame = client_send.seal(b"", b"first app frame").unwrap();
        assert_eq!(server_recv.open(b"", &frame).unwrap(), b"first app frame");

        let push = server_send.seal(b"", b"server push").unwrap();
        assert_eq!(client_recv.open(b"", &push).unwrap(), b"server push");

        assert_eq!(client_send.nonce(), 1);
        assert_eq!(client_recv.nonce(), 1);
    }

    #[test]
    fn transcript_is_deterministic_for_fixed_keys() {
        let run = || {
            let mut client = HandshakeState::with_ephemeral(
                KeyPair::from_private_key([0x11; 32]),
                KeyPair::from_private_key([0x22; 32]),
            );
            let mut server = WaSymmetricState::new(NOISE_PROTOCOL_NAME, &PROLOGUE);
            let ephemeral_pub = client.write_client_hello();
            server.mix_hash(&ephemeral_pub);

            let server_ephemeral = KeyPair::from_private_key([0x44; 32]);
            let server_static = KeyPair::from_private_key([0x33; 32]);
            server.mix_hash(&server_ephemeral.public);
            server.mix_key(&server_ephemeral.dh(&ephemeral_pub));
            let static_ct = server.encrypt_and_hash(&server_static.public).unwrap();
            server.mix_key(&server_static.dh(&ephemeral_pub));
            let payload_ct = server.encrypt_and_hash(b"cert").unwrap();

            client
                .read_server_hello(&server_ephemeral.public, &static_ct, &payload_ct)
                .unwrap();
            let (finish_static, finish_payload) = client.write_client_finish(b"login").unwrap();
            (static_ct, payload_ct, finish_static, finish_payload)
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn finish_before_server_hello_is_rejected() {
        let mut client = HandshakeState::initiate(KeyPair::generate());
        client.write_client_hello();
        assert_eq!(
            client.write_client_finish(b"payload").unwrap_err(),
            NoiseError::OutOfOrder
        );
    }
}
