//! Destinations for finished records.
//!
//! # Data Flow
//! ```text
//! RequestLogger::finish
//!     → FinishedRecord (serialized text + routing metadata)
//!     → Sink::emit
//!         → local.rs  (stdout / stderr, optional color)
//!         → remote.rs (spawned write to a RemoteWriter)
//!               └─ on failure → local.rs fallback
//! ```
//!
//! # Design Decisions
//! - One sink is chosen per logger at construction; call sites never branch
//! - Fallback on remote failure lives inside the remote sink
//! - Local writes are synchronous so their order matches finish order

pub mod cloud_logging;
pub mod local;
pub mod remote;

use serde_json::Value;
use thiserror::Error;

use crate::config::Labels;

pub use cloud_logging::CloudLoggingWriter;
pub use local::{LocalOutput, LocalSink, StdOutput, Stream};
pub use remote::{HttpRequestInfo, LogEntry, RemoteError, RemoteSink, RemoteWriter, Severity};

/// Whether the request ended in an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn from_flag(is_error: bool) -> Self {
        if is_error {
            Outcome::Error
        } else {
            Outcome::Success
        }
    }

    pub fn is_error(self) -> bool {
        self == Outcome::Error
    }
}

/// A sealed record ready for emission.
#[derive(Debug, Clone)]
pub struct FinishedRecord {
    /// The record as a JSON tree.
    pub document: Value,
    /// `document` serialized on one line.
    pub text: String,
    pub outcome: Outcome,
    pub status_code: u16,
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub labels: Labels,
}

/// Errors raised while emitting a record.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to a process stream failed.
    #[error("local output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A destination for finished records.
pub trait Sink: Send + Sync {
    /// Hand the record to the destination.
    ///
    /// Remote sinks return once the write is scheduled, not when it lands.
    fn emit(&self, record: FinishedRecord) -> Result<(), SinkError>;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}
