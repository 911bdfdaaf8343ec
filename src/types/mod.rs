//! Core protocol types: JIDs and related identifiers.

mod jid;

pub use jid::*;

/// Internal id of a node-level message exchange.
pub type MessageId = String;
