//! Protobuf schemas for the handshake and login payloads.

mod wa;

pub use wa::*;
