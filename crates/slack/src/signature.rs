//! Slack request-signature verification.
//!
//! Every inbound webhook is authenticated with the app's signing secret:
//! `v0=HMAC_SHA256(secret, "v0:{timestamp}:{body}")`, hex-encoded, carried
//! in `X-Slack-Signature` alongside `X-Slack-Request-Timestamp`. Requests
//! older than the replay window are rejected regardless of signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_VERSION: &str = "v0";

/// Maximum accepted clock skew between Slack and this service.
pub const REPLAY_WINDOW_SECS: i64 = 300;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("request timestamp `{0}` is not a unix epoch")]
    InvalidTimestamp(String),
    #[error("request timestamp outside the replay window ({skew_secs}s skew)")]
    StaleTimestamp { skew_secs: i64 },
    #[error("signature is not a `v0=<hex>` value")]
    MalformedSignature,
    #[error("signature mismatch")]
    Mismatch,
}

/// Computes the expected `v0=<hex>` signature for a request body.
pub fn sign(signing_secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(signing_secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length; new_from_slice cannot fail here.
        Err(_) => return format!("{SIGNATURE_VERSION}="),
    };
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    format!("{SIGNATURE_VERSION}={}", encode_hex(mac.finalize().into_bytes().as_slice()))
}

/// Verifies an inbound request against the signing secret.
pub fn verify_signature(
    signing_secret: &str,
    timestamp_header: &str,
    body: &[u8],
    provided_signature: &str,
    now_epoch: i64,
) -> Result<(), SignatureError> {
    let timestamp: i64 = timestamp_header
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp(timestamp_header.to_string()))?;

    let skew = (now_epoch - timestamp).abs();
    if skew > REPLAY_WINDOW_SECS {
        return Err(SignatureError::StaleTimestamp { skew_secs: skew });
    }

    if !provided_signature.starts_with("v0=") {
        return Err(SignatureError::MalformedSignature);
    }

    let expected = sign(signing_secret, timestamp, body);
    if constant_time_eq(expected.as_bytes(), provided_signature.trim().as_bytes()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in left.iter().zip(right) {
        diff |= a ^ b;
    }
    diff == 0
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
