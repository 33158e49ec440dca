//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limits > 0)
//! - Check that remote log names and endpoints are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LoggerConfig → Result<(), Vec<ValidationError>>
//! - A missing remote project id is not an error: the logger degrades to
//!   local output at construction time instead

use thiserror::Error;

use crate::config::schema::LoggerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Remote logging is enabled but a label cannot be used in a log name.
    #[error("{field} '{value}' is not usable in a remote log name")]
    InvalidLogLabel { field: &'static str, value: String },

    /// Remote endpoint is not an absolute http(s) URL.
    #[error("remote endpoint '{0}' is not a valid http(s) URL")]
    InvalidEndpoint(String),

    /// Remote write timeout is zero.
    #[error("remote.timeout_secs must be greater than zero")]
    ZeroTimeout,

    /// Body capture limit is zero.
    #[error("capture.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &LoggerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.capture.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.remote.enabled {
        for (field, value) in [("domain", &config.domain), ("service", &config.service)] {
            if !is_log_name_segment(value) {
                errors.push(ValidationError::InvalidLogLabel {
                    field,
                    value: value.clone(),
                });
            }
        }

        match url::Url::parse(&config.remote.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidEndpoint(
                config.remote.endpoint.clone(),
            )),
        }

        if config.remote.timeout_secs == 0 {
            errors.push(ValidationError::ZeroTimeout);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// Cloud Logging log ids allow [A-Za-z0-9_.-/]; '/' would split the id.
fn is_log_name_segment(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
