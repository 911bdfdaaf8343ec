//! Server certificate validation.
//!
//! The ServerHello payload decrypts to a NoiseCertificate whose details blob
//! is signed by the operator's long-term key. Checks run in a fixed order
//! and the first failure wins: issuer, signature, key binding, expiry.

use prost::Message;

use crate::constants::CERTIFICATE_ISSUER;
use crate::crypto::verify_signature;
use crate::error::Error;
use crate::proto::{CertDetails, NoiseCertificate};

/// Validate the decrypted certificate payload against the server static key
/// proposed in the handshake. `now` is wall time in seconds.
pub fn verify_certificate(
    payload: &[u8],
    server_static: &[u8; 32],
    trusted_key: &[u8; 32],
    now: u64,
) -> Result<(), Error> {
    let cert = NoiseCertificate::decode(payload)
        .map_err(|_| Error::AuthenticationFailed("noise certificate is not parseable".into()))?;
    let details_bytes = cert.details.unwrap_or_default();
    let details = CertDetails::decode(details_bytes.as_slice()).map_err(|_| {
        Error::AuthenticationFailed("noise certificate details are not parseable".into())
    })?;

    if details.issuer.as_deref() != Some(CERTIFICATE_ISSUER) {
        return Err(Error::AuthenticationFailed(format!(
            "noise certificate issued by unknown source: {:?}",
            details.issuer.unwrap_or_default()
        )));
    }

    let signature: [u8; 64] = cert
        .signature
        .as_deref()
        .unwrap_or_default()
        .try_into()
        .map_err(|_| {
            Error::AuthenticationFailed("noise certificate signature has wrong length".into())
        })?;
    if !verify_signature(trusted_key, &details_bytes, &signature) {
        return Err(Error::AuthenticationFailed(
            "invalid signature on noise certificate".into(),
        ));
    }

    if details.key.as_deref() != Some(&server_static[..]) {
        return Err(Error::AuthenticationFailed(
            "noise certificate key does not match proposed server static key".into(),
        ));
    }

    if let Some(expires) = details.expires {
        if expires <= now {
            return Err(Error::AuthenticationFailed(
                "noise certificate expired".into(),
            ));
        }
    }

    Ok(())
}
