//! Webhook signature verification.
//!
//! Stripe signs each delivery with a `stripe-signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`, where the HMAC-SHA256 is taken
//! over `"{t}.{body}"` with the endpoint's signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The header has no `t=` element.
    #[error("missing timestamp")]
    MissingTimestamp,

    /// The header has no `v1=` element.
    #[error("missing v1 signature")]
    MissingSignature,

    /// The timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance")]
    Expired,

    /// No signature matched the payload.
    #[error("signature mismatch")]
    Mismatch,

    /// The signing secret could not key the HMAC.
    #[error("invalid signing secret")]
    InvalidSecret,
}

/// Compute HMAC-SHA256 and return the hex-encoded result.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the key is rejected.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Build a `stripe-signature` header value for a payload.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the key is rejected.
pub fn stripe_signature_header(
    secret: &str,
    timestamp: i64,
    payload: &str,
) -> Result<String, SignatureError> {
    let signature = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"))?;
    Ok(format!("t={timestamp},v1={signature}"))
}

/// Verify a `stripe-signature` header against a payload.
///
/// `now` is the current unix time in seconds.
///
/// # Errors
///
/// Returns a `SignatureError` describing the first check that failed.
pub fn verify_stripe_signature(
    secret: &str,
    payload: &str,
    header: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MissingTimestamp)?;

    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    if (now - signed_at).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"))?;
    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
