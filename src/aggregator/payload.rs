//! Response payloads handed to `finish`.

use serde_json::{Map, Value};

/// The outgoing response as seen by the response hook.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Serialized body; parsed as JSON when possible.
    Text(String),
    /// Already-structured body.
    Json(Value),
}

impl ResponsePayload {
    /// Interpret raw response bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => ResponsePayload::Text(text.to_string()),
            Err(_) => {
                ResponsePayload::Json(Value::String(format!("[binary: {} bytes]", bytes.len())))
            }
        }
    }

    /// Structured view: empty text is `{}`, non-JSON text a string.
    pub fn into_value(self) -> Value {
        match self {
            ResponsePayload::Json(value) => value,
            ResponsePayload::Text(text) if text.trim().is_empty() => Value::Object(Map::new()),
            ResponsePayload::Text(text) => {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            }
        }
    }

    /// Whether the payload is an object carrying a truthy `isError`.
    pub fn is_error_marked(&self) -> bool {
        match self {
            ResponsePayload::Json(value) => has_error_marker(value),
            ResponsePayload::Text(text) => serde_json::from_str::<Value>(text)
                .map(|value| has_error_marker(&value))
                .unwrap_or(false),
        }
    }
}

impl From<String> for ResponsePayload {
    fn from(text: String) -> Self {
        ResponsePayload::Text(text)
    }
}

impl From<&str> for ResponsePayload {
    fn from(text: &str) -> Self {
        ResponsePayload::Text(text.to_string())
    }
}

impl From<Value> for ResponsePayload {
    fn from(value: Value) -> Self {
        ResponsePayload::Json(value)
    }
}

fn has_error_marker(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|object| object.get("isError"))
        .is_some_and(is_truthy)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Attach `statusCode`; non-objects are wrapped as `{"body": v}` first.
pub(crate) fn with_status(value: Value, status_code: u16) -> Value {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            let mut object = Map::new();
            object.insert("body".to_string(), other);
            object
        }
    };
    object.insert("statusCode".to_string(), Value::from(status_code));
    Value::Object(object)
}
