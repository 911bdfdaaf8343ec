//! Length-prefixed framing.
//!
//! Every payload travels as a 24-bit big-endian length followed by that many
//! bytes. The very first outbound frame of a connection is prefixed with the
//! protocol prologue; one inbound websocket message may carry several
//! concatenated frames.

use crate::constants::PROLOGUE;
use crate::error::Error;

/// Largest payload a 24-bit length prefix can describe.
pub const MAX_FRAME_SIZE: usize = (1 << 24) - 1;

/// Outbound frame encoder. Tracks whether the prologue has been sent.
pub struct FrameCodec {
    intro_sent: bool,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self { intro_sent: false }
    }

    /// Wrap `payload` into one websocket message body.
    pub fn encode_frame(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        if payload.len() > MAX_FRAME_SIZE {
            return Err(Error::MalformedFrame(format!(
                "frame of {} bytes exceeds the 24-bit length limit",
                payload.len()
            )));
        }

        let intro = if self.intro_sent { &[][..] } else { &PROLOGUE[..] };
        self.intro_sent = true;

        let mut message = Vec::with_capacity(intro.len() + 3 + payload.len());
        message.extend_from_slice(intro);
        message.push((payload.len() >> 16) as u8);
        message.push((payload.len() >> 8) as u8);
        message.push(payload.len() as u8);
        message.extend_from_slice(payload);
        Ok(message)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Split one inbound websocket message into its concatenated frames.
pub fn split_frames(message: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    let mut frames = Vec::new();
    let mut rest = message;

    while !rest.is_empty() {
        if rest.len() < 3 {
            return Err(Error::MalformedFrame("truncated length prefix".into()));
        }
        let len =
            (usize::from(rest[0]) << 16) | (usize::from(rest[1]) << 8) | usize::from(rest[2]);
        rest = &rest[3..];
        if rest.len() < len {
            return Err(Error::MalformedFrame(format!(
                "declared {len} bytes but only {} remain",
                rest.len()
            )));
        }
        frames.push(rest[..len].to_vec());
        rest = &rest[len..];
    }

    Ok(frames)
}
