//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the request logger.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Default Cloud Logging write endpoint.
pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://logging.googleapis.com/v2/entries:write";

/// Root configuration for the request logger.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Only record errors; `append_field` becomes a no-op.
    pub only_errors: bool,

    /// Domain label (first part of the remote log name).
    pub domain: String,

    /// Service label (second part of the remote log name).
    pub service: String,

    /// Module label.
    pub module: String,

    /// Prefix local output with an ANSI color chosen by status code.
    pub colors: bool,

    /// Remote sink settings.
    pub remote: RemoteConfig,

    /// Request/response capture settings.
    pub capture: CaptureConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            only_errors: false,
            domain: "app".to_string(),
            service: "api".to_string(),
            module: "default".to_string(),
            colors: false,
            remote: RemoteConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl LoggerConfig {
    /// Labels attached to every record and remote entry.
    pub fn labels(&self) -> Labels {
        Labels {
            domain: self.domain.clone(),
            service: self.service.clone(),
            module: self.module.clone(),
        }
    }

    /// Remote log name: `<domain>-<service>-logs`.
    pub fn log_name(&self) -> String {
        format!("{}-{}-logs", self.domain, self.service)
    }
}

/// Remote logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Send records to the remote logging service.
    pub enabled: bool,

    /// Project that owns the log. Required when `enabled`; when missing the
    /// logger degrades to local output.
    pub project_id: Option<String>,

    /// OAuth bearer token sent with each write.
    pub access_token: Option<String>,

    /// `entries:write` endpoint URL.
    pub endpoint: String,

    /// Per-write timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project_id: None,
            access_token: None,
            endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            timeout_secs: 10,
        }
    }
}

/// Request/response capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Largest request or response body buffered into the record.
    pub max_body_bytes: usize,

    /// Methods that get a disabled logger (pre-flight requests).
    pub skip_methods: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            skip_methods: vec!["OPTIONS".to_string()],
        }
    }
}

impl CaptureConfig {
    /// Whether requests with `method` skip log aggregation.
    pub fn skips(&self, method: &str) -> bool {
        self.skip_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// Label set shared by the record's `INFO` block and remote entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Labels {
    pub domain: String,
    pub service: String,
    pub module: String,
}
