//! Request metadata captured into the record's `INFO` block.

use serde_json::{Map, Value};

use crate::aggregator::envelope::normalize_body;
use crate::config::Labels;

/// Metadata of the inbound request an aggregator describes.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    /// Correlation id (`x-request-id` or a generated UUID).
    pub id: String,
    /// Path and query as received.
    pub url: String,
    pub method: String,
    /// Path parameters, usually an object.
    pub params: Value,
    /// Decoded request body (`null` when absent or not captured).
    pub body: Value,
}

impl RequestInfo {
    /// Create request info with a fresh id, empty params and no body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            method: method.into(),
            params: Value::Object(Map::new()),
            body: Value::Null,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Build the `INFO` map, normalizing envelope bodies.
    pub(crate) fn into_info(self, labels: &Labels) -> Map<String, Value> {
        let mut info = Map::new();
        info.insert("__id".to_string(), Value::String(self.id));
        info.insert("__url".to_string(), Value::String(self.url));
        info.insert("__method".to_string(), Value::String(self.method));
        info.insert("__params".to_string(), self.params);
        info.insert("__body".to_string(), normalize_body(self.body));
        info.insert("domain".to_string(), Value::String(labels.domain.clone()));
        info.insert("service".to_string(), Value::String(labels.service.clone()));
        info.insert("module".to_string(), Value::String(labels.module.clone()));
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels() -> Labels {
        Labels {
            domain: "d".into(),
            service: "s".into(),
            module: "m".into(),
        }
    }

    #[test]
    fn test_info_block() {
        let info = RequestInfo::new("POST", "/process-order?x=1")
            .with_id("req-1")
            .with_params(json!({"id": "7"}))
            .with_body(json!({"amount": 100}))
            .into_info(&labels());

        assert_eq!(
            Value::Object(info),
            json!({
                "__id": "req-1",
                "__url": "/process-order?x=1",
                "__method": "POST",
                "__params": {"id": "7"},
                "__body": {"amount": 100},
                "domain": "d",
                "service": "s",
                "module": "m",
            })
        );
    }

    #[test]
    fn test_envelope_body_is_decoded() {
        let info = RequestInfo::new("POST", "/push")
            .with_body(json!({"message": {"data": "eyJhIjoxfQ=="}}))
            .into_info(&labels());
        assert_eq!(info["__body"], json!({"a": 1}));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = RequestInfo::new("GET", "/");
        let b = RequestInfo::new("GET", "/");
        assert_ne!(a.id, b.id);
    }
}
