//! The per-request log record and its key-collision policy.

use serde::Serialize;
use serde_json::{Map, Value};

/// Everything one request contributes to its emitted log line.
///
/// Serializes as `{INFO, LOGS, ERRORS?, RESPONSE | ERROR_RESPONSE}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogRecord {
    #[serde(rename = "INFO")]
    pub info: Map<String, Value>,

    #[serde(rename = "LOGS")]
    pub fields: Map<String, Value>,

    #[serde(rename = "ERRORS", skip_serializing_if = "Option::is_none")]
    pub errors: Option<Map<String, Value>>,

    #[serde(rename = "RESPONSE", skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    #[serde(rename = "ERROR_RESPONSE", skip_serializing_if = "Option::is_none")]
    pub error_response: Option<Value>,
}

impl LogRecord {
    pub fn new(info: Map<String, Value>) -> Self {
        Self {
            info,
            ..Self::default()
        }
    }

    /// Insert a field without overwriting; returns the key actually used.
    pub fn insert_field(&mut self, key: &str, value: Value) -> String {
        insert_unique(&mut self.fields, key, value)
    }

    /// Insert an error entry without overwriting; returns the key actually used.
    pub fn insert_error(&mut self, key: &str, value: Value, code: Option<&str>) -> String {
        let errors = self.errors.get_or_insert_with(Map::new);
        insert_unique(errors, key, error_entry(value, code))
    }
}

fn error_entry(value: Value, code: Option<&str>) -> Value {
    let mut entry = Map::new();
    entry.insert("value".to_string(), value);
    if let Some(code) = code {
        entry.insert("code".to_string(), Value::String(code.to_string()));
    }
    Value::Object(entry)
}

/// Store `value` under `key`, or under `"<key> (<n>)"` for the first free `n`.
pub fn insert_unique(map: &mut Map<String, Value>, key: &str, value: Value) -> String {
    let slot = if map.contains_key(key) {
        let mut n: u64 = 1;
        loop {
            let candidate = format!("{key} ({n})");
            if !map.contains_key(&candidate) {
                break candidate;
            }
            n += 1;
        }
    } else {
        key.to_string()
    };
    map.insert(slot.clone(), value);
    slot
}
