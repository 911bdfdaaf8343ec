//! The connection actor: one task per connection owning the transport,
//! cipher pair, pending-request table and keep-alive timer.
//!
//! All mutation happens on this task, so no locks are needed. The session
//! façade talks to it through a command channel; inbound nodes are
//! correlated against pending requests first and then routed by tag.

mod handlers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, error, info, warn};
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::auth::AuthState;
use crate::binary::{decode, encode, encode_uint, DecodeError, Node};
use crate::constants::{DJB_KEY_TYPE, FLAG_COMPRESSED, MESSAGE_TAG_ROTATION, PREKEY_UPLOAD_BATCH};
use crate::crypto::{CipherState, KeyPair};
use crate::error::{ConnectionClosed, Error};
use crate::events::{Event, EventBus};
use crate::handshake;
use crate::socket::{split_frames, FrameCodec, FrameTransport};
use crate::store::PreKeyRecord;
use crate::types::servers;

/// Connection lifecycle. Terminal state is `Closed`; `Restarting` is entered
/// when a pairing completed and the session is about to reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    New,
    Connecting,
    Handshaking,
    Authenticated,
    Restarting,
    Closed,
}

/// Resolution of the authentication attempt on one connection.
pub(crate) enum AuthSignal {
    LoggedIn(Box<AuthState>),
    /// Pairing succeeded; reconnect once with this auth state.
    Restart(Box<AuthState>),
    Failed(Error),
}

pub(crate) enum Command {
    SendNode(Node),
    Request {
        node: Node,
        reply: oneshot::Sender<Result<Node, Error>>,
    },
    Close,
}

/// Message-id generator: `xxxxx.yyyyy-counter` with a fresh random prefix
/// every [`MESSAGE_TAG_ROTATION`] ids, so ids never repeat.
pub(crate) struct MessageTagGenerator {
    prefix: Option<String>,
    counter: u32,
}

impl MessageTagGenerator {
    pub(crate) fn new() -> Self {
        Self {
            prefix: None,
            counter: 0,
        }
    }

    pub(crate) fn next(&mut self) -> String {
        let prefix = self
            .prefix
            .get_or_insert_with(|| {
                let mut rng = rand::thread_rng();
                format!(
                    "{:05}.{:05}",
                    rng.gen_range(0..100_000u32),
                    rng.gen_range(0..100_000u32)
                )
            })
            .clone();
        self.counter += 1;
        let tag = format!("{prefix}-{}", self.counter);
        if self.counter >= MESSAGE_TAG_ROTATION {
            self.prefix = None;
            self.counter = 0;
        }
        tag
    }
}

/// Cheap, cloneable handle the session hands to callers.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<Command>,
    state: watch::Receiver<ConnState>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnState {
        *self.state.borrow()
    }

    /// Fire-and-forget node send.
    pub async fn send_node(&self, node: Node) -> Result<(), Error> {
        if self.state() != ConnState::Authenticated {
            return Err(Error::NotConnected);
        }
        self.cmd_tx
            .send(Command::SendNode(node))
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Send a node and await the response correlated by its `id` attribute.
    /// Fails up front, without sending anything, unless authenticated.
    pub async fn request(&self, node: Node) -> Result<Node, Error> {
        if self.state() != ConnState::Authenticated {
            return Err(Error::NotConnected);
        }
        let (reply, response) = oneshot::channel();
        self.cmd_tx
            .send(Command::Request { node, reply })
            .await
            .map_err(|_| Error::NotConnected)?;
        match response.await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionClosed(ConnectionClosed {
                is_logged_out: false,
                is_auth_done: true,
                reason: "request abandoned".into(),
            })),
        }
    }

    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }
}

pub(crate) struct Connection<T: FrameTransport> {
    transport: T,
    codec: FrameCodec,
    auth: AuthState,
    send_cipher: Option<CipherState>,
    recv_cipher: Option<CipherState>,
    pending: HashMap<String, oneshot::Sender<Result<Node, Error>>>,
    events: Arc<EventBus>,
    state_tx: watch::Sender<ConnState>,
    cmd_rx: mpsc::Receiver<Command>,
    keep_alive: Option<time::Interval>,
    keep_alive_interval: Duration,
    trusted_cert_key: [u8; 32],
    tags: MessageTagGenerator,
    failure: Option<Error>,
    auth_tx: Option<oneshot::Sender<AuthSignal>>,
    closing: bool,
    restart: bool,
}

impl<T: FrameTransport> Connection<T> {
    pub(crate) fn new(
        transport: T,
        auth: AuthState,
        events: Arc<EventBus>,
        trusted_cert_key: [u8; 32],
        keep_alive_interval: Duration,
    ) -> (Self, ConnectionHandle, oneshot::Receiver<AuthSignal>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnState::Connecting);
        let (auth_tx, auth_rx) = oneshot::channel();

        let conn = Self {
            transport,
            codec: FrameCodec::new(),
            auth,
            send_cipher: None,
            recv_cipher: None,
            pending: HashMap::new(),
            events,
            state_tx,
            cmd_rx,
            keep_alive: None,
            keep_alive_interval,
            trusted_cert_key,
            tags: MessageTagGenerator::new(),
            failure: None,
            auth_tx: Some(auth_tx),
            closing: false,
            restart: false,
        };
        let handle = ConnectionHandle {
            cmd_tx,
            state: state_rx,
        };
        (conn, handle, auth_rx)
    }

    /// Run the connection to completion: handshake, then the main loop.
    pub(crate) async fn run(mut self) {
        self.set_state(ConnState::Handshaking);
        match handshake::run(
            &mut self.transport,
            &mut self.codec,
            &self.auth,
            &self.trusted_cert_key,
        )
        .await
        {
            Ok((send, recv)) => {
                self.send_cipher = Some(send);
                self.recv_cipher = Some(recv);
                self.set_state(ConnState::Authenticated);
                self.start_keep_alive();
                info!("noise handshake complete");
                self.main_loop().await;
            }
            Err(err) => {
                let folded = match err {
                    Error::AuthenticationFailed(_) => err,
                    other => Error::AuthenticationFailed(other.to_string()),
                };
                self.fail(folded, true).await;
            }
        }
        self.shutdown();
    }

    async fn main_loop(&mut self) {
        loop {
            tokio::select! {
                command = self.cmd_rx.recv() => match command {
                    Some(Command::SendNode(node)) => {
                        if let Err(err) = self.send_node(&node).await {
                            warn!("send failed: {err}");
                        }
                    }
                    Some(Command::Request { node, reply }) => {
                        self.handle_request(node, reply).await;
                    }
                    Some(Command::Close) | None => {
                        let _ = self.transport.close(1000).await;
                        break;
                    }
                },
                message = self.transport.next() => match message {
                    Some(Ok(bytes)) => self.handle_message(&bytes).await,
                    Some(Err(err)) => {
                        self.fail(err, false).await;
                        break;
                    }
                    None => break,
                },
                _ = tick(&mut self.keep_alive) => self.send_keep_alive_ping().await,
            }
            if self.closing {
                break;
            }
        }
    }

    fn set_state(&self, state: ConnState) {
        self.state_tx.send_replace(state);
    }

    fn auth_done(&self) -> bool {
        self.auth_tx.is_none()
    }

    /// Record a failure; the first one recorded decides the close reason.
    async fn fail(&mut self, err: Error, disconnect: bool) {
        error!("connection failure: {err}");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        if !self.auth_done() {
            self.send_cipher = None;
            self.recv_cipher = None;
        }
        if disconnect {
            self.closing = true;
            let _ = self.transport.close(1000).await;
        }
    }

    async fn send_node(&mut self, node: &Node) -> Result<(), Error> {
        let cipher = self.send_cipher.as_mut().ok_or(Error::NotConnected)?;
        let mut plaintext = Vec::with_capacity(1 + 64);
        plaintext.push(0x00);
        plaintext.extend_from_slice(&encode(node));
        let sealed = cipher.seal(b"", &plaintext)?;
        debug!("sending <{}> ({} bytes sealed)", node.tag, sealed.len());
        let message = self.codec.encode_frame(&sealed)?;
        self.transport.send(message).await
    }

    async fn handle_request(&mut self, node: Node, reply: oneshot::Sender<Result<Node, Error>>) {
        let id = match node.id() {
            Some(id) => id.to_string(),
            None => {
                let _ = reply.send(Err(Error::MalformedFrame("request node has no id".into())));
                return;
            }
        };
        if self.pending.insert(id.clone(), reply).is_some() {
            warn!("replaced outstanding request with id {id}");
        }
        if let Err(err) = self.send_node(&node).await {
            if let Some(slot) = self.pending.remove(&id) {
                let _ = slot.send(Err(err));
            }
        }
    }

    async fn handle_message(&mut self, message: &[u8]) {
        debug!("message received [{}]", hex::encode(message));
        let frames = match split_frames(message) {
            Ok(frames) => frames,
            Err(err) => {
                warn!("dropping malformed websocket message: {err}");
                return;
            }
        };
        for frame in frames {
            self.handle_frame(&frame).await;
            if self.closing {
                break;
            }
        }
    }

    async fn handle_frame(&mut self, ciphertext: &[u8]) {
        let opened = match self.recv_cipher.as_mut() {
            Some(cipher) => cipher.open(b"", ciphertext),
            None => return,
        };
        let plaintext = match opened {
            Ok(plaintext) => plaintext,
            Err(err) => {
                self.fail(Error::DecryptionFailed(err), true).await;
                return;
            }
        };
        if plaintext.is_empty() {
            warn!("dropping frame without flag byte");
            return;
        }

        let body = if plaintext[0] & FLAG_COMPRESSED != 0 {
            match inflate(&plaintext[1..]) {
                Ok(body) => body,
                Err(err) => {
                    warn!("dropping frame with bad deflate payload: {err}");
                    return;
                }
            }
        } else {
            plaintext[1..].to_vec()
        };

        match decode(&body) {
            Ok(node) => self.dispatch(node).await,
            Err(DecodeError::StreamEnd) => {}
            Err(err) => warn!("dropping undecodable node: {err}"),
        }
    }

    async fn dispatch(&mut self, node: Node) {
        debug!("node received: <{} {:?}>", node.tag, node.attrs);

        // Correlation strictly before tag routing, so plain iq results need
        // no handler of their own.
        if let Some(id) = node.id() {
            if let Some(slot) = self.pending.remove(id) {
                debug!("completing pending request {id}");
                let _ = slot.send(Ok(node.clone()));
            }
        }

        if let Err(err) = handlers::handle(self, node).await {
            self.fail(err, true).await;
        }
    }

    fn start_keep_alive(&mut self) {
        let mut interval = time::interval_at(
            Instant::now() + self.keep_alive_interval,
            self.keep_alive_interval,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.keep_alive = Some(interval);
    }

    fn stop_keep_alive(&mut self) {
        self.keep_alive = None;
    }

    /// Ping through the request machinery with the response discarded; a
    /// failed ping is not fatal, the close will be seen on the socket.
    async fn send_keep_alive_ping(&mut self) {
        let id = self.tags.next();
        let mut ping = Node::new("iq");
        ping.set_attr("id", id.clone())
            .set_attr("to", format!("@{}", servers::DEFAULT_USER))
            .set_attr("type", "get")
            .set_attr("xmlns", "w:p");
        ping.add_child(Node::new("ping"));

        let (reply, _discard) = oneshot::channel();
        self.pending.insert(id.clone(), reply);
        if let Err(err) = self.send_node(&ping).await {
            debug!("keep-alive ping failed: {err}");
            self.pending.remove(&id);
        }
    }

    /// Register a fresh batch of one-time prekeys with the server. Sent
    /// fire-and-forget so the connection task never awaits its own inbox.
    async fn upload_pre_keys(&mut self) -> Result<(), Error> {
        let start = self.auth.next_prekey_id;
        debug!("uploading prekeys {start}..{}", start + PREKEY_UPLOAD_BATCH);

        let store = Arc::clone(&self.auth.store);
        let mut key_nodes = Vec::new();
        for id in start..start + PREKEY_UPLOAD_BATCH {
            let key_pair = KeyPair::generate();
            let public = key_pair.public;
            match store.store_pre_key(id, PreKeyRecord { id, key_pair }).await {
                Ok(()) => {
                    let mut id_node = Node::new("id");
                    id_node.set_bytes(encode_uint(u64::from(id), 3));
                    let mut value = Node::new("value");
                    value.set_bytes(public.to_vec());
                    let mut key = Node::new("key");
                    key.set_children(vec![id_node, value]);
                    key_nodes.push(key);
                }
                Err(err) => error!("failed to store prekey {id}: {err}"),
            }
        }

        let mut registration = Node::new("registration");
        registration.set_bytes(self.auth.registration_id.to_be_bytes().to_vec());
        let mut key_type = Node::new("type");
        key_type.set_bytes(vec![DJB_KEY_TYPE]);
        let mut identity = Node::new("identity");
        identity.set_bytes(self.auth.identity_key.public.to_vec());
        let mut list = Node::new("list");
        list.set_children(key_nodes);

        let mut skey_id = Node::new("id");
        skey_id.set_bytes(encode_uint(u64::from(self.auth.signed_prekey.id), 3));
        let mut skey_value = Node::new("value");
        skey_value.set_bytes(self.auth.signed_prekey.key_pair.public.to_vec());
        let mut skey_signature = Node::new("signature");
        skey_signature.set_bytes(self.auth.signed_prekey.signature.to_vec());
        let mut skey = Node::new("skey");
        skey.set_children(vec![skey_id, skey_value, skey_signature]);

        let id = self.tags.next();
        let mut iq = Node::new("iq");
        iq.set_attr("id", id.clone())
            .set_attr("xmlns", "encrypt")
            .set_attr("type", "set")
            .set_attr("to", format!("@{}", servers::DEFAULT_USER));
        iq.set_children(vec![registration, key_type, identity, list, skey]);

        let (reply, _discard) = oneshot::channel();
        self.pending.insert(id.clone(), reply);
        if let Err(err) = self.send_node(&iq).await {
            self.pending.remove(&id);
            return Err(err);
        }
        self.auth.next_prekey_id = start + PREKEY_UPLOAD_BATCH;
        Ok(())
    }

    /// QR string shown by the embedding app: pairing ref plus our public
    /// key material, comma-separated.
    fn build_qr_string(&self, reference: &str) -> String {
        format!(
            "{},{},{},{}",
            reference,
            BASE64.encode(self.auth.noise_key.public),
            BASE64.encode(self.auth.identity_key.public),
            BASE64.encode(self.auth.adv_secret),
        )
    }

    fn complete_auth(&mut self) {
        if let Some(tx) = self.auth_tx.take() {
            let _ = tx.send(AuthSignal::LoggedIn(Box::new(self.auth.clone())));
        }
        self.events.fire(&Event::Open);
    }

    /// Gracefully close so the session can reconnect in resume mode.
    async fn request_restart(&mut self) {
        info!("authentication success, restarting connection");
        self.restart = true;
        self.closing = true;
        let _ = self.transport.close(1000).await;
    }

    fn close_reason(&self) -> ConnectionClosed {
        match &self.failure {
            None => ConnectionClosed::clean(),
            Some(Error::NodeStream { code, .. }) if code == "401" => ConnectionClosed {
                is_logged_out: true,
                is_auth_done: true,
                reason: "Device Logged Out".into(),
            },
            Some(Error::NodeStream { .. }) => ConnectionClosed {
                is_logged_out: false,
                is_auth_done: true,
                reason: "Unhandled Stream Error".into(),
            },
            Some(Error::AuthenticationFailed(_)) => ConnectionClosed {
                is_logged_out: false,
                is_auth_done: false,
                reason: "Authentication Failed".into(),
            },
            Some(Error::DecryptionFailed(_)) => ConnectionClosed {
                is_logged_out: false,
                is_auth_done: true,
                reason: "Decryption Failed".into(),
            },
            Some(err) => ConnectionClosed {
                is_logged_out: false,
                is_auth_done: true,
                reason: format!("Unknown Failure: {err}"),
            },
        }
    }

    /// Release everything and report the close exactly once.
    fn shutdown(mut self) {
        self.stop_keep_alive();
        let closed = self.close_reason();

        for (_, slot) in self.pending.drain() {
            let _ = slot.send(Err(Error::ConnectionClosed(closed.clone())));
        }

        if self.restart {
            self.set_state(ConnState::Restarting);
            if let Some(tx) = self.auth_tx.take() {
                let _ = tx.send(AuthSignal::Restart(Box::new(self.auth.clone())));
            }
            return;
        }

        self.set_state(ConnState::Closed);
        info!("connection closed: {}", closed.reason);
        match self.auth_tx.take() {
            Some(tx) => {
                let err = self
                    .failure
                    .take()
                    .unwrap_or_else(|| Error::ConnectionClosed(closed.clone()));
                let _ = tx.send(AuthSignal::Failed(err));
            }
            None => self.events.fire(&Event::Close(closed)),
        }
    }
}

async fn tick(keep_alive: &mut Option<time::Interval>) {
    match keep_alive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
impl<T: FrameTransport> Connection<T> {
    /// Main loop without the handshake, for tests that inject ciphers.
    pub(crate) async fn run_post_handshake(mut self) {
        self.main_loop().await;
        self.shutdown();
    }
}
