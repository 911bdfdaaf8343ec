//! Transport core for a WhatsApp multi-device client.
//!
//! This crate takes a fresh websocket to the multi-device gateway through
//! the Noise XX handshake and then carries application nodes over the
//! resulting encrypted channel: framing, request/response correlation,
//! keep-alive, pairing and resume login payloads. The Signal ratchet, media
//! transfer, and the high-level message types are deliberately out of
//! scope and consumed through narrow interfaces.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wamulti::{AuthState, Event, Session};
//! use wamulti::store::MemoryStore;
//!
//! # async fn run() -> wamulti::Result<()> {
//! let auth = AuthState::new(Arc::new(MemoryStore::new()));
//! let mut session = Session::new(auth);
//! session.on(|event| {
//!     if let Event::Qr(qr) = event {
//!         println!("scan to pair: {qr}");
//!     }
//! });
//! session.connect().await?;
//! let conn = session.authenticate().await?;
//! # let _ = conn;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod binary;
pub mod conn;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod events;
pub mod handshake;
pub mod proto;
pub mod session;
pub mod socket;
pub mod store;
pub mod types;

pub use auth::{AuthState, Me};
pub use binary::{Node, NodeContent};
pub use conn::{ConnState, ConnectionHandle};
pub use error::{ConnectionClosed, Error, Result};
pub use events::Event;
pub use session::{Session, SessionConfig};
pub use types::Jid;
