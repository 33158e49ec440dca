//! The per-request log aggregator.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::aggregator::bounded::{to_bounded_value, SerializeError};
use crate::aggregator::payload::{with_status, ResponsePayload};
use crate::aggregator::record::LogRecord;
use crate::aggregator::request::RequestInfo;
use crate::config::{Labels, LoggerConfig};
use crate::sink::{
    CloudLoggingWriter, FinishedRecord, LocalOutput, LocalSink, Outcome, RemoteSink, RemoteWriter,
    Sink, StdOutput,
};

/// Setup shared by every logger: configuration, local output and the
/// remote writer, built once.
pub struct LoggerSettings {
    config: LoggerConfig,
    remote: RemoteSetup,
    output: Arc<dyn LocalOutput>,
}

enum RemoteSetup {
    Disabled,
    Ready(Arc<dyn RemoteWriter>),
    Unavailable(String),
}

impl LoggerSettings {
    /// Build settings, constructing the Cloud Logging writer when enabled.
    ///
    /// Missing credentials are not fatal: loggers fall back to local output.
    pub fn new(config: LoggerConfig) -> Self {
        let remote = if !config.remote.enabled {
            RemoteSetup::Disabled
        } else {
            match config
                .remote
                .project_id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
            {
                None => RemoteSetup::Unavailable("remote.project_id is not set".to_string()),
                Some(project_id) => match CloudLoggingWriter::new(project_id, &config.remote) {
                    Ok(writer) => {
                        tracing::info!(
                            project_id = %project_id,
                            log_name = %config.log_name(),
                            "Remote logging enabled"
                        );
                        RemoteSetup::Ready(Arc::new(writer))
                    }
                    Err(e) => RemoteSetup::Unavailable(e.to_string()),
                },
            }
        };

        if let RemoteSetup::Unavailable(reason) = &remote {
            tracing::warn!(reason = %reason, "Remote logging unavailable, using local output");
        }

        Self {
            config,
            remote,
            output: Arc::new(StdOutput),
        }
    }

    /// Use `writer` as the remote destination regardless of `remote.enabled`.
    pub fn with_remote_writer(mut self, writer: Arc<dyn RemoteWriter>) -> Self {
        self.remote = RemoteSetup::Ready(writer);
        self
    }

    /// Replace the process streams used for local output.
    pub fn with_output(mut self, output: Arc<dyn LocalOutput>) -> Self {
        self.output = output;
        self
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Whether new loggers will write remotely.
    pub fn remote_ready(&self) -> bool {
        matches!(self.remote, RemoteSetup::Ready(_))
    }

    fn local_sink(&self) -> LocalSink {
        LocalSink::new(self.config.colors, self.output.clone())
    }

    fn build_sink(&self, request_id: &str) -> Box<dyn Sink> {
        match &self.remote {
            RemoteSetup::Disabled => Box::new(self.local_sink()),
            RemoteSetup::Ready(writer) => Box::new(RemoteSink::new(
                writer.clone(),
                self.local_sink(),
                self.config.log_name(),
            )),
            RemoteSetup::Unavailable(reason) => {
                tracing::warn!(
                    request_id = %request_id,
                    reason = %reason,
                    "Remote logging requested but unavailable, logging locally"
                );
                Box::new(self.local_sink())
            }
        }
    }
}

impl std::fmt::Debug for LoggerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerSettings")
            .field("config", &self.config)
            .field("remote_ready", &self.remote_ready())
            .finish_non_exhaustive()
    }
}

/// Handle to one request's log aggregator.
///
/// A logger belongs to exactly one request. Handles are cloned only to reach
/// the same request from its own call chain (extensions, the task-local
/// context, `context::spawn`); never hand a handle to another request. The
/// mutex exists because a request's future may resume on another worker
/// thread, not because the record is shared, so it is never contended.
///
/// Every method is infallible from the caller's side: failures are written
/// to the local fallback output instead of being returned.
#[derive(Clone)]
pub struct RequestLogger {
    inner: Option<Arc<Shared>>,
}

struct Shared {
    request_id: String,
    url: String,
    method: String,
    labels: Labels,
    only_errors: bool,
    state: Mutex<State>,
    sink: Box<dyn Sink>,
    local: LocalSink,
}

struct State {
    record: LogRecord,
    finished: bool,
}

impl RequestLogger {
    /// Create a logger for `info`, choosing its sink from `settings`.
    pub fn new(info: RequestInfo, settings: &LoggerSettings) -> Self {
        let config = settings.config();
        let labels = config.labels();
        let request_id = info.id.clone();
        let url = info.url.clone();
        let method = info.method.clone();
        let sink = settings.build_sink(&request_id);

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            url = %url,
            sink = sink.name(),
            "Request logger created"
        );

        let record = LogRecord::new(info.into_info(&labels));
        Self {
            inner: Some(Arc::new(Shared {
                request_id,
                url,
                method,
                labels,
                only_errors: config.only_errors,
                state: Mutex::new(State {
                    record,
                    finished: false,
                }),
                sink,
                local: settings.local_sink(),
            })),
        }
    }

    /// A stand-in that accepts and discards every call.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.inner.as_deref().map(|shared| shared.request_id.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.inner
            .as_deref()
            .is_some_and(|shared| shared.state.lock().finished)
    }

    /// Copy of the record as it stands.
    pub fn snapshot(&self) -> Option<LogRecord> {
        self.inner
            .as_deref()
            .map(|shared| shared.state.lock().record.clone())
    }

    /// Add a field to `LOGS`. Repeated keys are stored as `"key (n)"`.
    pub fn append_field<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let Some(shared) = self.inner.as_deref() else {
            return;
        };
        if shared.only_errors {
            return;
        }
        match to_bounded_value(value) {
            Ok(value) => shared.update(key, |record| {
                record.insert_field(key, value);
            }),
            Err(error) => shared.unserializable(key, &error),
        }
    }

    /// Add an entry to `ERRORS` as `{value, code}`.
    pub fn append_error<T: Serialize + ?Sized>(&self, key: &str, value: &T, code: Option<&str>) {
        let Some(shared) = self.inner.as_deref() else {
            return;
        };
        match to_bounded_value(value) {
            Ok(value) => shared.update(key, |record| {
                record.insert_error(key, value, code);
            }),
            Err(error) => shared.unserializable(key, &error),
        }
    }

    /// Add an error value built from `error` and its source chain.
    pub fn append_failure(
        &self,
        key: &str,
        error: &(dyn std::error::Error + 'static),
        code: Option<&str>,
    ) {
        self.append_error(key, &describe_error(error), code);
    }

    /// Seal the record with the response and emit it.
    ///
    /// Only the first call has an effect; later calls are ignored with a
    /// warning.
    pub fn finish(&self, payload: impl Into<ResponsePayload>, is_error: bool, status_code: u16) {
        let Some(shared) = self.inner.as_deref() else {
            return;
        };
        let outcome = Outcome::from_flag(is_error);

        let document = {
            let mut state = shared.state.lock();
            if state.finished {
                tracing::warn!(
                    request_id = %shared.request_id,
                    "finish called more than once, ignoring"
                );
                return;
            }
            state.finished = true;

            let response = with_status(payload.into().into_value(), status_code);
            match outcome {
                Outcome::Success => state.record.response = Some(response),
                Outcome::Error => state.record.error_response = Some(response),
            }

            match serde_json::to_value(&state.record) {
                Ok(document) => document,
                Err(error) => {
                    shared.report(&format!("Logger error => {error}"), &state.record);
                    return;
                }
            }
        };

        let text = match serde_json::to_string(&document) {
            Ok(text) => text,
            Err(error) => {
                shared.report(&format!("Logger error => {error}"), &document);
                return;
            }
        };

        let record = FinishedRecord {
            document,
            text,
            outcome,
            status_code,
            request_id: shared.request_id.clone(),
            url: shared.url.clone(),
            method: shared.method.clone(),
            labels: shared.labels.clone(),
        };

        let fallback_text = record.text.clone();
        if let Err(error) = shared.sink.emit(record) {
            tracing::error!(
                request_id = %shared.request_id,
                sink = shared.sink.name(),
                error = %error,
                "Failed to emit request log"
            );
            shared.local.diagnostic(&format!("Logger error => {error}"));
            shared.local.diagnostic(&fallback_text);
        }
    }
}

impl Shared {
    fn update(&self, key: &str, apply: impl FnOnce(&mut LogRecord)) {
        let mut state = self.state.lock();
        if state.finished {
            tracing::debug!(
                request_id = %self.request_id,
                key = %key,
                "Request log already finished, dropping entry"
            );
            return;
        }
        apply(&mut state.record);
    }

    fn unserializable(&self, key: &str, error: &SerializeError) {
        tracing::warn!(
            request_id = %self.request_id,
            key = %key,
            error = %error,
            "Log value could not be serialized"
        );
        self.local
            .diagnostic(&format!("{key} <unserializable value: {error}>"));
    }

    fn report(&self, message: &str, raw: &dyn std::fmt::Debug) {
        tracing::error!(request_id = %self.request_id, "{message}");
        self.local.diagnostic(message);
        self.local.diagnostic(&format!("{raw:?}"));
    }
}

fn describe_error(error: &(dyn std::error::Error + 'static)) -> Value {
    let mut causes = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        causes.push(Value::String(cause.to_string()));
        source = cause.source();
    }
    serde_json::json!({
        "message": error.to_string(),
        "causes": causes,
    })
}

impl std::fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.as_deref() {
            Some(shared) => f
                .debug_struct("RequestLogger")
                .field("request_id", &shared.request_id)
                .field("method", &shared.method)
                .field("url", &shared.url)
                .field("sink", &shared.sink.name())
                .finish(),
            None => f.write_str("RequestLogger(disabled)"),
        }
    }
}
