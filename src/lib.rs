//! Per-request log aggregation for axum services.
//!
//! Every request gets one [`RequestLogger`]. Code anywhere in the request's
//! async call tree appends fields and errors to it, directly or through
//! [`context::log_field`] / [`context::log_error`], and the middleware emits
//! the whole record as a single JSON line when the response is sent.

pub mod aggregator;
pub mod config;
pub mod context;
pub mod http;
pub mod sink;

pub use aggregator::{LogRecord, LoggerSettings, RequestInfo, RequestLogger, ResponsePayload};
pub use config::LoggerConfig;
pub use context::{log_error, log_failure, log_field, require_current, ContextError};
