//! Error types for the vitals engine
//!
//! Missing telemetry is never an error here: scores that cannot be computed are
//! represented as `None`. Errors are reserved for the boundaries (payload
//! parsing, configuration, calendar arithmetic, encoding).

use thiserror::Error;

/// Errors that can occur at the engine boundaries
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse vendor payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid TOML configuration: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Invalid scoring configuration: {0}")]
    InvalidConfig(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Date out of range: {0}")]
    InvalidDate(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
