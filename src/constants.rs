//! Protocol constants shared by the handshake and transport layers.
//!
//! Everything here must match the server bit-for-bit; a wrong prologue or
//! pattern name surfaces only as a silent close during the handshake.

use std::time::Duration;

/// WebSocket endpoints for the multi-device gateway.
pub mod endpoints {
    pub const HOST: &str = "web.whatsapp.com";
    pub const PORT: u16 = 443;
    pub const URL: &str = "wss://web.whatsapp.com/ws/chat";
    pub const ORIGIN: &str = "https://web.whatsapp.com";
}

/// Noise protocol name, zero-padded to the 32-byte hash length so the
/// initial handshake hash is the name itself.
pub const NOISE_PROTOCOL_NAME: &[u8] = b"Noise_XX_25519_AESGCM_SHA256\0\0\0\0";

/// Prologue bytes: mixed into the handshake hash and prepended to the very
/// first frame of every connection.
pub const PROLOGUE: [u8; 4] = [b'W', b'A', 6, 0];

/// Flag bit marking a deflate-compressed plaintext frame.
pub const FLAG_COMPRESSED: u8 = 0x02;

/// Issuer string expected on the server's Noise certificate.
pub const CERTIFICATE_ISSUER: &str = "WhatsAppLongTerm1";

/// Long-term Curve25519 public key the certificate signature must verify
/// under.
pub const WHATSAPP_LONG_TERM: [u8; 32] = [
    0x14, 0x23, 0x75, 0x57, 0x4d, 0x0a, 0x58, 0x71, 0x66, 0xaa, 0xe7, 0x1e, 0xbe, 0x51, 0x64,
    0x37, 0xc4, 0xa2, 0x8b, 0x73, 0xe3, 0x69, 0x5c, 0x6c, 0xe1, 0xf7, 0xf9, 0x54, 0x5d, 0xa8,
    0xee, 0x6b,
];

/// Client version advertised in the UserAgent payload.
pub const WHATSAPP_WEB_VERSION: (u32, u32, u32) = (2, 2142, 12);

/// Companion build hash (base64), sent during registration.
pub const BUILD_HASH: &str = "S9Kdc4pc4EJryo21snc5cg==";

/// Browser triple advertised to the primary device: (os, device, os version).
pub const DEFAULT_BROWSER: (&str, &str, &str) = ("Ubuntu", "Chrome", "104.0.5112.79");

/// Interval between keep-alive pings while authenticated.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Number of message ids issued under one random tag prefix before a fresh
/// prefix is drawn. Ids never repeat because the prefix rotates first.
pub const MESSAGE_TAG_ROTATION: u32 = 100;

/// Number of prekeys generated and uploaded in one registration batch.
pub const PREKEY_UPLOAD_BATCH: u32 = 10;

/// Curve25519 key type byte used by the Signal layer.
pub const DJB_KEY_TYPE: u8 = 5;
