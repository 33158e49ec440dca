//! Remote logging sink.
//!
//! # Responsibilities
//! - Turn a finished record into a structured remote log entry
//! - Submit it without blocking the response path
//! - Fall back to local output when the write fails
//!
//! # Design Decisions
//! - Fire-and-forget: the write is spawned on the current tokio runtime
//! - No retries; a failed write is printed locally and reported once
//! - The writer is shared between loggers (pooled HTTP client)

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::sink::local::LocalSink;
use crate::sink::{FinishedRecord, Outcome, Sink, SinkError};

/// Entry severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Error,
}

impl From<Outcome> for Severity {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Severity::Info,
            Outcome::Error => Severity::Error,
        }
    }
}

/// HTTP metadata attached to an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestInfo {
    pub request_url: String,
    pub request_method: String,
    pub status: u16,
}

/// One structured entry for the remote service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log id, `<domain>-<service>-logs`.
    pub log_name: String,
    pub severity: Severity,
    pub http_request: HttpRequestInfo,
    pub labels: BTreeMap<String, String>,
    pub insert_id: String,
    pub timestamp: DateTime<Utc>,
    pub json_payload: Value,
}

impl LogEntry {
    pub fn from_record(log_name: &str, record: &FinishedRecord) -> Self {
        let labels = BTreeMap::from([
            ("domain".to_string(), record.labels.domain.clone()),
            ("service".to_string(), record.labels.service.clone()),
            ("module".to_string(), record.labels.module.clone()),
        ]);
        Self {
            log_name: log_name.to_string(),
            severity: record.outcome.into(),
            http_request: HttpRequestInfo {
                request_url: record.url.clone(),
                request_method: record.method.clone(),
                status: record.status_code,
            },
            labels,
            insert_id: record.request_id.clone(),
            timestamp: Utc::now(),
            json_payload: record.document.clone(),
        }
    }
}

/// Errors from the remote logging service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The client could not be built or configured.
    #[error("remote client initialization failed: {0}")]
    Init(String),

    /// The request did not complete.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("remote service rejected entry with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// No async runtime to run the write on.
    #[error("no tokio runtime available for remote write")]
    NoRuntime,
}

/// Black-box client of the remote logging service.
#[async_trait]
pub trait RemoteWriter: Send + Sync {
    async fn write(&self, entry: LogEntry) -> Result<(), RemoteError>;
}

/// Sink that submits records to a [`RemoteWriter`].
pub struct RemoteSink {
    writer: Arc<dyn RemoteWriter>,
    fallback: LocalSink,
    log_name: String,
}

impl RemoteSink {
    pub fn new(
        writer: Arc<dyn RemoteWriter>,
        fallback: LocalSink,
        log_name: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            fallback,
            log_name: log_name.into(),
        }
    }
}

impl Sink for RemoteSink {
    fn emit(&self, record: FinishedRecord) -> Result<(), SinkError> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                report_failure(&self.fallback, &record.request_id, &RemoteError::NoRuntime);
                return self.fallback.emit(record);
            }
        };

        let entry = LogEntry::from_record(&self.log_name, &record);
        let writer = self.writer.clone();
        let fallback = self.fallback.clone();

        runtime.spawn(async move {
            match writer.write(entry).await {
                Ok(()) => {
                    tracing::trace!(request_id = %record.request_id, "Remote log entry written");
                }
                Err(error) => {
                    report_failure(&fallback, &record.request_id, &error);
                    if let Err(local_error) = fallback.emit(record) {
                        tracing::error!(error = %local_error, "Local fallback write failed");
                    }
                }
            }
        });

        Ok(())
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

fn report_failure(fallback: &LocalSink, request_id: &str, error: &RemoteError) {
    tracing::error!(
        request_id = %request_id,
        error = %error,
        "Remote log write failed, falling back to local output"
    );
    fallback.diagnostic(&format!("remote log write failed for request {request_id}: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Labels;
    use crate::sink::local::{LocalOutput, Stream};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Default)]
    struct Capture {
        lines: Mutex<Vec<(Stream, String)>>,
    }

    impl LocalOutput for Capture {
        fn write_line(&self, stream: Stream, line: &str) -> std::io::Result<()> {
            self.lines.lock().push((stream, line.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recording {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl RemoteWriter for Recording {
        async fn write(&self, entry: LogEntry) -> Result<(), RemoteError> {
            self.entries.lock().push(entry);
            Ok(())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl RemoteWriter for Rejecting {
        async fn write(&self, _entry: LogEntry) -> Result<(), RemoteError> {
            Err(RemoteError::Rejected {
                status: 403,
                body: "permission denied".into(),
            })
        }
    }

    fn record(outcome: Outcome) -> FinishedRecord {
        FinishedRecord {
            document: json!({"LOGS": {"a": 1}}),
            text: r#"{"LOGS":{"a":1}}"#.to_string(),
            outcome,
            status_code: 500,
            request_id: "req-9".into(),
            url: "/error".into(),
            method: "GET".into(),
            labels: Labels {
                domain: "test-app".into(),
                service: "demo".into(),
                module: "gcloud-setup".into(),
            },
        }
    }

    async fn wait_for<F: Fn() -> bool>(check: F) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_entry_shape() {
        let entry = LogEntry::from_record("test-app-demo-logs", &record(Outcome::Error));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["logName"], "test-app-demo-logs");
        assert_eq!(value["severity"], "ERROR");
        assert_eq!(value["insertId"], "req-9");
        assert_eq!(value["httpRequest"]["status"], 500);
        assert_eq!(value["httpRequest"]["requestMethod"], "GET");
        assert_eq!(value["labels"]["module"], "gcloud-setup");
        assert_eq!(value["jsonPayload"]["LOGS"]["a"], 1);
    }

    #[tokio::test]
    async fn test_successful_write_skips_fallback() {
        let writer = Arc::new(Recording::default());
        let capture = Arc::new(Capture::default());
        let sink = RemoteSink::new(writer.clone(), LocalSink::new(false, capture.clone()), "logs");

        sink.emit(record(Outcome::Success)).unwrap();
        wait_for(|| writer.entries.lock().len() == 1).await;

        assert_eq!(writer.entries.lock()[0].severity, Severity::Info);
        assert!(capture.lines.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_falls_back_to_local() {
        let capture = Arc::new(Capture::default());
        let fallback = LocalSink::new(false, capture.clone());
        let sink = RemoteSink::new(Arc::new(Rejecting), fallback, "logs");

        sink.emit(record(Outcome::Error)).unwrap();
        wait_for(|| capture.lines.lock().len() == 2).await;

        let lines = capture.lines.lock();
        assert!(lines[0].1.contains("permission denied"));
        assert_eq!(lines[1], (Stream::Stderr, r#"{"LOGS":{"a":1}}"#.to_string()));
    }

    #[test]
    fn test_without_runtime_writes_locally() {
        let capture = Arc::new(Capture::default());
        let fallback = LocalSink::new(false, capture.clone());
        let sink = RemoteSink::new(Arc::new(Recording::default()), fallback, "logs");

        sink.emit(record(Outcome::Success)).unwrap();

        let lines = capture.lines.lock();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].1.contains("no tokio runtime"));
        assert_eq!(lines[1].0, Stream::Stdout);
    }
}
