//! Cloud Logging `entries:write` client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::RemoteConfig;
use crate::sink::remote::{HttpRequestInfo, LogEntry, RemoteError, RemoteWriter, Severity};

/// Writes entries to Google Cloud Logging over its REST API.
#[derive(Debug, Clone)]
pub struct CloudLoggingWriter {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    access_token: Option<String>,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    entries: [WireEntry<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEntry<'a> {
    log_name: String,
    resource: Resource<'a>,
    severity: Severity,
    http_request: &'a HttpRequestInfo,
    labels: &'a BTreeMap<String, String>,
    insert_id: &'a str,
    timestamp: String,
    json_payload: &'a serde_json::Value,
}

#[derive(Serialize)]
struct Resource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    labels: BTreeMap<&'static str, &'a str>,
}

impl CloudLoggingWriter {
    /// Build a writer for `project_id` using the endpoint, token and timeout in `config`.
    pub fn new(project_id: impl Into<String>, config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Init(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            project_id: project_id.into(),
            access_token: config.access_token.clone(),
        })
    }

    /// Fully qualified log name for a log id.
    pub fn qualified_log_name(&self, log_id: &str) -> String {
        format!("projects/{}/logs/{}", self.project_id, log_id)
    }

    fn wire_entry<'a>(&'a self, entry: &'a LogEntry) -> WireEntry<'a> {
        WireEntry {
            log_name: self.qualified_log_name(&entry.log_name),
            resource: Resource {
                kind: "global",
                labels: BTreeMap::from([("project_id", self.project_id.as_str())]),
            },
            severity: entry.severity,
            http_request: &entry.http_request,
            labels: &entry.labels,
            insert_id: &entry.insert_id,
            timestamp: entry.timestamp.to_rfc3339(),
            json_payload: &entry.json_payload,
        }
    }
}

#[async_trait]
impl RemoteWriter for CloudLoggingWriter {
    async fn write(&self, entry: LogEntry) -> Result<(), RemoteError> {
        let body = WriteRequest {
            entries: [self.wire_entry(&entry)],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
