//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::LoggerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable consulted for the remote project id.
pub const PROJECT_ID_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Environment variable consulted for the remote bearer token.
pub const ACCESS_TOKEN_ENV: &str = "REQUEST_LOGGER_ACCESS_TOKEN";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LoggerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<LoggerConfig, ConfigError> {
    let config: LoggerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Fill unset remote credentials from the environment.
///
/// Values already present in the file win over the environment.
pub fn apply_env_overrides(config: &mut LoggerConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from(config: &mut LoggerConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if config.remote.project_id.is_none() {
        config.remote.project_id = non_empty(PROJECT_ID_ENV);
    }
    if config.remote.access_token.is_none() {
        config.remote.access_token = non_empty(ACCESS_TOKEN_ENV);
    }
}
