//! Pub/Sub push envelope detection and decoding.
//!
//! A push subscription delivers `{"message": {"data": "<base64>", ...}}`.
//! The record stores the decoded payload instead of the wrapper.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

/// Replace an envelope with its decoded payload; anything else is returned as-is.
///
/// Decoded text that is JSON is parsed; other text is kept as a string.
/// Data that is not base64 or not UTF-8 leaves the body untouched.
pub fn normalize_body(body: Value) -> Value {
    let Some(data) = envelope_data(&body) else {
        return body;
    };
    let Ok(bytes) = STANDARD.decode(data) else {
        return body;
    };
    let Ok(text) = String::from_utf8(bytes) else {
        return body;
    };
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn envelope_data(body: &Value) -> Option<&str> {
    body.get("message")?
        .as_object()?
        .get("data")?
        .as_str()
        .filter(|data| !data.is_empty())
}
