//! Tag-based routing for inbound nodes.
//!
//! Runs after request correlation. A handler may send nodes, mutate the
//! auth state, emit events, or return an error, which the dispatcher treats
//! as connection-fatal.

use log::{debug, info, warn};
use prost::Message;

use crate::auth::Me;
use crate::binary::Node;
use crate::error::Error;
use crate::events::Event;
use crate::proto::SignedDeviceIdentity;
use crate::socket::FrameTransport;
use crate::types::{servers, Jid};

use super::Connection;

pub(super) async fn handle<T: FrameTransport>(
    conn: &mut Connection<T>,
    node: Node,
) -> Result<(), Error> {
    match node.tag.as_str() {
        "iq" => handle_iq(conn, node).await,
        "success" => handle_success(conn).await,
        "failure" | "stream:error" => handle_stream_failure(conn, &node),
        "message" => {
            conn.events.fire(&Event::Inbox(node));
            Ok(())
        }
        "ack" | "receipt" => {
            conn.events.fire(&Event::Ack(node));
            Ok(())
        }
        "ib" => {
            debug!("ib node ignored");
            Ok(())
        }
        other => {
            debug!("no handler for tag {other:?}, dropping node");
            Ok(())
        }
    }
}

/// Server-initiated iqs: the pairing exchange. Results of our own requests
/// were already completed by correlation.
async fn handle_iq<T: FrameTransport>(conn: &mut Connection<T>, node: Node) -> Result<(), Error> {
    if let Some(pair_device) = node.child("pair-device") {
        let reference = pair_device
            .child("ref")
            .and_then(Node::bytes)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
        acknowledge(conn, &node).await?;
        match reference {
            Some(reference) => {
                let qr = conn.build_qr_string(&reference);
                conn.events.fire(&Event::Qr(qr));
            }
            None => warn!("pair-device without a ref child"),
        }
        return Ok(());
    }

    if node.child("pair-success").is_some() {
        return handle_pair_success(conn, &node).await;
    }

    Ok(())
}

/// Pairing completed: record who we are and the device identity, then close
/// so the session reconnects in resume mode.
async fn handle_pair_success<T: FrameTransport>(
    conn: &mut Connection<T>,
    node: &Node,
) -> Result<(), Error> {
    let pair = node
        .child("pair-success")
        .ok_or_else(|| Error::AuthenticationFailed("pair-success vanished".into()))?;

    let jid: Jid = pair
        .child("device")
        .and_then(|device| device.attr("jid"))
        .ok_or_else(|| Error::AuthenticationFailed("pair-success without device jid".into()))?
        .parse()
        .map_err(|e| Error::AuthenticationFailed(format!("pair-success jid: {e}")))?;

    if let Some(bytes) = pair.child("device-identity").and_then(Node::bytes) {
        let identity = SignedDeviceIdentity::decode(bytes)
            .map_err(|e| Error::AuthenticationFailed(format!("device identity: {e}")))?;
        conn.auth.signed_device_identity = Some(identity);
    }

    info!("paired as {jid}");
    conn.auth.me = Some(Me { jid });

    acknowledge(conn, node).await?;
    conn.request_restart().await;
    Ok(())
}

/// Login finished on this connection. On a fresh identity the first batch
/// of prekeys is registered before the session is notified.
async fn handle_success<T: FrameTransport>(conn: &mut Connection<T>) -> Result<(), Error> {
    info!("authentication complete");
    if conn.auth.next_prekey_id == 1 {
        if let Err(err) = conn.upload_pre_keys().await {
            warn!("prekey upload failed: {err}");
        }
    }
    conn.complete_auth();
    Ok(())
}

fn handle_stream_failure<T: FrameTransport>(
    conn: &mut Connection<T>,
    node: &Node,
) -> Result<(), Error> {
    let code = node.attr("code").unwrap_or_default().to_string();
    let reason = node.attr("reason").unwrap_or(code.as_str()).to_string();

    if !conn.auth_done() {
        Err(Error::AuthenticationFailed(format!(
            "authentication failed: {reason}"
        )))
    } else {
        Err(Error::NodeStream { code, reason })
    }
}

async fn acknowledge<T: FrameTransport>(
    conn: &mut Connection<T>,
    node: &Node,
) -> Result<(), Error> {
    let mut ack = Node::new("iq");
    if let Some(id) = node.id() {
        ack.set_attr("id", id);
    }
    ack.set_attr("to", servers::DEFAULT_USER)
        .set_attr("type", "result");
    conn.send_node(&ack).await
}
