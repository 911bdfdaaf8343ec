//! Crate-wide error taxonomy.
//!
//! During the handshake every failure is folded into `AuthenticationFailed`;
//! after it, AEAD failures are fatal while malformed nodes are logged and
//! dropped. `ConnectionClosed` is the only error surfaced to embedders once
//! a connection has gone down.

use thiserror::Error;

use crate::binary::DecodeError;
use crate::crypto::CipherError;

pub type Result<T> = std::result::Result<T, Error>;

/// Terminal close descriptor, carried by the `close` event and by every
/// request future failed at disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionClosed {
    /// Server rejected the credentials with a 401 stream error.
    pub is_logged_out: bool,
    /// Whether the authentication phase had completed before the close.
    pub is_auth_done: bool,
    pub reason: String,
}

impl ConnectionClosed {
    pub fn clean() -> Self {
        Self {
            is_logged_out: false,
            is_auth_done: true,
            reason: "Connection Closed Cleanly".into(),
        }
    }
}

impl std::fmt::Display for ConnectionClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection closed: {}", self.reason)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// A frame length prefix overran the buffer, or a frame was truncated.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// AEAD open failed or a nonce counter was exhausted. Fatal on receive.
    #[error("decryption failed: {0}")]
    DecryptionFailed(#[from] CipherError),

    /// Certificate check, Noise read failure, or server rejection during
    /// the handshake.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server-sent `failure` or `stream:error` node. Code "401" means the
    /// device was logged out.
    #[error("stream error {code}: {reason}")]
    NodeStream { code: String, reason: String },

    /// The connection is gone; carries the mapped close cause.
    #[error("{0}")]
    ConnectionClosed(ConnectionClosed),

    /// Operation requires an authenticated connection.
    #[error("not connected")]
    NotConnected,

    /// WebSocket transport failure.
    #[error("websocket: {0}")]
    Socket(String),

    /// Protobuf parse failure on a handshake message.
    #[error("protobuf decode: {0}")]
    Proto(#[from] prost::DecodeError),

    /// Node decode failure on an application frame.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl Error {
    /// True when this error means the peer considers us logged out.
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Error::NodeStream { code, .. } if code == "401")
    }
}
