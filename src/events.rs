//! Event surface exposed to the embedding application.

use std::sync::RwLock;

use log::warn;

use crate::binary::Node;
use crate::error::ConnectionClosed;

/// Events emitted by a session.
#[derive(Debug, Clone)]
pub enum Event {
    /// The connection is authenticated and ready.
    Open,
    /// A pairing QR string to present to the primary device.
    Qr(String),
    /// The connection went down; fired exactly once per connection.
    Close(ConnectionClosed),
    /// An inbound message node.
    Inbox(Node),
    /// A delivery acknowledgement node.
    Ack(Node),
}

pub type EventHandler = Box<dyn Fn(&Event) + Send + Sync>;

/// Registered handlers, shared between the session and its connection task.
pub struct EventBus {
    handlers: RwLock<Vec<EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn on<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers.write().expect("event lock").push(Box::new(handler));
    }

    pub fn fire(&self, event: &Event) {
        match self.handlers.read() {
            Ok(handlers) => {
                for handler in handlers.iter() {
                    handler(event);
                }
            }
            Err(_) => warn!("event handler lock poisoned, dropping event"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
