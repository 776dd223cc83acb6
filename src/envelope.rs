//! The CPCB dashboard endpoints wrap every request and response body in
//! base64-encoded JSON. This module is the codec for that envelope.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

/// `base64("{}")`, the body sent to endpoints that take no parameters.
pub const EMPTY_PAYLOAD: &str = "e30=";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("response body is empty")]
    EmptyBody,

    #[error("response is not valid base64")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded response is not valid JSON")]
    Json(#[from] serde_json::Error),
}

/// Serializes a JSON payload and wraps it in the base64 envelope.
pub fn encode(payload: &Value) -> String {
    BASE64.encode(payload.to_string())
}

/// Unwraps a base64 envelope into JSON. Whitespace around the encoded body is
/// tolerated; the portal occasionally appends a trailing newline.
pub fn decode(body: &[u8]) -> Result<Value, EnvelopeError> {
    let trimmed: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if trimmed.is_empty() {
        return Err(EnvelopeError::EmptyBody);
    }
    let decoded = BASE64.decode(&trimmed)?;
    Ok(serde_json::from_slice(&decoded)?)
}
