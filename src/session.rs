//! Session façade: lifecycle of a client across connections.
//!
//! `connect` opens the websocket and spawns the connection task;
//! `authenticate` resolves once the server accepts the login. After a
//! first-time pairing the session reconnects exactly once, carrying the
//! freshly populated auth state, so the second handshake resumes.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::info;
use tokio::sync::oneshot;

use crate::auth::AuthState;
use crate::binary::Node;
use crate::conn::{AuthSignal, Connection, ConnectionHandle, MessageTagGenerator};
use crate::constants::{endpoints, KEEP_ALIVE_INTERVAL, WHATSAPP_LONG_TERM};
use crate::error::Error;
use crate::events::{Event, EventBus};
use crate::socket::WebSocketTransport;

/// Connection parameters; the defaults point at the production gateway.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub origin: String,
    pub keep_alive_interval: Duration,
    /// Long-term key the server certificate must verify under.
    pub trusted_cert_key: [u8; 32],
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: endpoints::URL.into(),
            origin: endpoints::ORIGIN.into(),
            keep_alive_interval: KEEP_ALIVE_INTERVAL,
            trusted_cert_key: WHATSAPP_LONG_TERM,
        }
    }
}

impl SessionConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    pub fn with_trusted_cert_key(mut self, key: [u8; 32]) -> Self {
        self.trusted_cert_key = key;
        self
    }
}

pub struct Session {
    config: SessionConfig,
    auth: Option<AuthState>,
    events: Arc<EventBus>,
    handle: Option<ConnectionHandle>,
    auth_rx: Option<oneshot::Receiver<AuthSignal>>,
    tags: MessageTagGenerator,
    restarted: bool,
}

impl Session {
    pub fn new(auth: AuthState) -> Self {
        Self::with_config(auth, SessionConfig::default())
    }

    pub fn with_config(auth: AuthState, config: SessionConfig) -> Self {
        Self {
            config,
            auth: Some(auth),
            events: Arc::new(EventBus::new()),
            handle: None,
            auth_rx: None,
            tags: MessageTagGenerator::new(),
            restarted: false,
        }
    }

    /// Register an event handler. Handlers run on the connection task.
    pub fn on<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.on(handler);
    }

    /// Open the websocket and start the connection task. Resolves once the
    /// websocket upgrade completes; the handshake proceeds in the task.
    pub async fn connect(&mut self) -> Result<(), Error> {
        let transport =
            WebSocketTransport::connect(&self.config.url, Some(&self.config.origin)).await?;
        self.spawn_connection(transport)
    }

    fn spawn_connection(&mut self, transport: WebSocketTransport) -> Result<(), Error> {
        let auth = self.auth.take().ok_or(Error::NotConnected)?;
        let (conn, handle, auth_rx) = Connection::new(
            transport,
            auth,
            Arc::clone(&self.events),
            self.config.trusted_cert_key,
            self.config.keep_alive_interval,
        );
        tokio::spawn(conn.run());
        self.handle = Some(handle);
        self.auth_rx = Some(auth_rx);
        Ok(())
    }

    /// Resolve once authenticated, reconnecting once after a pairing.
    pub async fn authenticate(&mut self) -> Result<ConnectionHandle, Error> {
        loop {
            let auth_rx = self.auth_rx.take().ok_or(Error::NotConnected)?;
            let signal = auth_rx.await.map_err(|_| {
                Error::AuthenticationFailed("connection task ended unexpectedly".into())
            })?;
            match signal {
                AuthSignal::LoggedIn(auth) => {
                    self.auth = Some(*auth);
                    return self.handle.clone().ok_or(Error::NotConnected);
                }
                AuthSignal::Restart(auth) => {
                    if self.restarted {
                        return Err(Error::AuthenticationFailed(
                            "server requested a second restart".into(),
                        ));
                    }
                    self.restarted = true;
                    self.auth = Some(*auth);
                    info!("pairing complete, reconnecting in resume mode");
                    let transport = WebSocketTransport::connect(
                        &self.config.url,
                        Some(&self.config.origin),
                    )
                    .await?;
                    self.spawn_connection(transport)?;
                }
                AuthSignal::Failed(err) => return Err(err),
            }
        }
    }

    /// Fire-and-forget node send.
    pub async fn send_node(&self, node: Node) -> Result<(), Error> {
        self.handle()?.send_node(node).await
    }

    /// Send a node and await its correlated response. A missing `id`
    /// attribute is filled in from the tag generator.
    pub async fn request(&mut self, mut node: Node) -> Result<Node, Error> {
        if node.id().is_none() {
            node.set_attr("id", self.tags.next());
        }
        self.handle()?.request(node).await
    }

    /// Mark an inbound message as read.
    pub async fn send_read_receipt(&mut self, message: &Node) -> Result<(), Error> {
        let to = message
            .attr("from")
            .ok_or_else(|| Error::MalformedFrame("message has no from attribute".into()))?;
        let id = message
            .id()
            .ok_or_else(|| Error::MalformedFrame("message has no id attribute".into()))?;

        let mut receipt = Node::new("receipt");
        receipt
            .set_attr("to", to)
            .set_attr("type", "read")
            .set_attr("id", id)
            .set_attr("t", unix_now().to_string());
        self.send_node(receipt).await
    }

    /// Request a clean close.
    pub async fn close(&self) {
        if let Some(handle) = &self.handle {
            handle.close().await;
        }
    }

    /// Generate a fresh unique message id.
    pub fn next_message_id(&mut self) -> String {
        self.tags.next()
    }

    pub fn auth_state(&self) -> Option<&AuthState> {
        self.auth.as_ref()
    }

    fn handle(&self) -> Result<&ConnectionHandle, Error> {
        self.handle.as_ref().ok_or(Error::NotConnected)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_the_gateway() {
        let config = SessionConfig::default();
        assert_eq!(config.url, endpoints::URL);
        assert_eq!(config.origin, endpoints::ORIGIN);
        assert_eq!(config.keep_alive_interval, Duration::from_secs(20));
        assert_eq!(config.trusted_cert_key, WHATSAPP_LONG_TERM);
    }

    #[test]
    fn config_builders_override_fields() {
        let config = SessionConfig::default()
            .with_url("wss://localhost:8443/ws")
            .with_origin("https://localhost")
            .with_keep_alive_interval(Duration::from_secs(5))
            .with_trusted_cert_key([7u8; 32]);

        assert_eq!(config.url, "wss://localhost:8443/ws");
        assert_eq!(config.origin, "https://localhost");
        assert_eq!(config.keep_alive_interval, Duration::from_secs(5));
        assert_eq!(config.trusted_cert_key, [7u8; 32]);
    }
}
