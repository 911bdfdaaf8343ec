//! WebSocket transport for the multi-device gateway.
//!
//! The connection actor talks to the network through the [`FrameTransport`]
//! trait: one call per websocket binary message. Tests substitute a
//! channel-backed implementation.

mod frame;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::Error;

pub use frame::{split_frames, FrameCodec, MAX_FRAME_SIZE};

/// One websocket binary message in, one out.
#[async_trait]
pub trait FrameTransport: Send {
    async fn send(&mut self, message: Vec<u8>) -> Result<(), Error>;

    /// Next inbound binary message; `None` once the peer has closed.
    async fn next(&mut self) -> Option<Result<Vec<u8>, Error>>;

    async fn close(&mut self, code: u16) -> Result<(), Error>;
}

/// TLS websocket transport.
pub struct WebSocketTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    /// Open the websocket; resolves once the upgrade completes.
    pub async fn connect(url: &str, origin: Option<&str>) -> Result<Self, Error> {
        let mut request = url
            .into_client_request()
            .map_err(|e| Error::Socket(e.to_string()))?;
        if let Some(origin) = origin {
            let value =
                HeaderValue::from_str(origin).map_err(|e| Error::Socket(e.to_string()))?;
            request.headers_mut().insert("Origin", value);
        }

        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| Error::Socket(e.to_string()))?;
        debug!("websocket open: {url}");
        Ok(Self { ws })
    }
}

#[async_trait]
impl FrameTransport for WebSocketTransport {
    async fn send(&mut self, message: Vec<u8>) -> Result<(), Error> {
        self.ws
            .send(Message::Binary(message))
            .await
            .map_err(|e| Error::Socket(e.to_string()))
    }

    async fn next(&mut self) -> Option<Result<Vec<u8>, Error>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Binary(data)) => return Some(Ok(data)),
                Ok(Message::Close(frame)) => {
                    debug!("websocket close frame: {frame:?}");
                    return None;
                }
                // Pings are answered by tungstenite itself.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(Message::Text(text)) => {
                    warn!("unexpected text message ({} bytes), ignoring", text.len());
                    continue;
                }
                Err(e) => return Some(Err(Error::Socket(e.to_string()))),
            }
        }
    }

    async fn close(&mut self, code: u16) -> Result<(), Error> {
        self.ws
            .close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: "".into(),
            }))
            .await
            .map_err(|e| Error::Socket(e.to_string()))
    }
}
