//! Handshake driver: ClientHello → ServerHello → ClientFinish.
//!
//! Runs on the connection task between websocket open and the first
//! application frame. Exactly one inbound message is expected while the
//! handshake is in flight; no other sends may interleave.

mod cert;
mod payload;

use log::debug;
use prost::Message;

use crate::auth::AuthState;
use crate::crypto::{CipherState, HandshakeState};
use crate::error::Error;
use crate::proto::{ClientFinish, ClientHello, HandshakeMessage};
use crate::socket::{split_frames, FrameCodec, FrameTransport};

pub use cert::verify_certificate;
pub use payload::build_client_payload;

/// Drive the Noise handshake to completion, returning `(send, recv)`
/// transport ciphers. Any error here must be treated as fatal by the
/// caller: surface `AuthenticationFailed` and close the socket.
pub(crate) async fn run<T: FrameTransport>(
    transport: &mut T,
    codec: &mut FrameCodec,
    auth: &AuthState,
    trusted_cert_key: &[u8; 32],
) -> Result<(CipherState, CipherState), Error> {
    let mut noise = HandshakeState::initiate(auth.noise_key.clone());

    // -> ClientHello, prologue-prefixed as the first frame of the socket.
    let ephemeral = noise.write_client_hello();
    let hello = HandshakeMessage {
        client_hello: Some(ClientHello {
            ephemeral: Some(ephemeral.to_vec()),
        }),
        ..Default::default()
    };
    transport
        .send(codec.encode_frame(&hello.encode_to_vec())?)
        .await?;
    debug!("client hello sent, awaiting server hello");

    // <- ServerHello: exactly one frame.
    let message = transport
        .next()
        .await
        .ok_or_else(|| Error::AuthenticationFailed("connection closed during handshake".into()))??;
    let mut frames = split_frames(&message)?;
    if frames.len() != 1 {
        return Err(Error::AuthenticationFailed(format!(
            "expected one handshake frame, got {}",
            frames.len()
        )));
    }
    let reply = HandshakeMessage::decode(frames.remove(0).as_slice())?;
    let server_hello = reply
        .server_hello
        .ok_or_else(|| Error::AuthenticationFailed("handshake reply has no server hello".into()))?;

    let certificate = noise
        .read_server_hello(
            server_hello.ephemeral.as_deref().unwrap_or_default(),
            server_hello.r#static.as_deref().unwrap_or_default(),
            server_hello.payload.as_deref().unwrap_or_default(),
        )
        .map_err(|e| Error::AuthenticationFailed(format!("noise read failed: {e}")))?;

    let server_static = *noise
        .remote_static()
        .ok_or_else(|| Error::AuthenticationFailed("server static key missing".into()))?;
    verify_certificate(&certificate, &server_static, trusted_cert_key, unix_now())?;
    debug!("certificate verification ok");

    // -> ClientFinish carrying the login payload.
    let client_payload = build_client_payload(auth);
    let (static_ct, payload_ct) = noise
        .write_client_finish(&client_payload.encode_to_vec())
        .map_err(|e| Error::AuthenticationFailed(format!("noise write failed: {e}")))?;
    let finish = HandshakeMessage {
        client_finish: Some(ClientFinish {
            r#static: Some(static_ct),
            payload: Some(payload_ct),
        }),
        ..Default::default()
    };
    transport
        .send(codec.encode_frame(&finish.encode_to_vec())?)
        .await?;
    debug!("client finish sent, transport ciphers ready");

    Ok(noise.finish())
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
