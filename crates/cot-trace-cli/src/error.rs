//! Error types for the trace validator CLI
//!
//! Per-document problems never show up here; they become failed entries in
//! the batch output. These errors stop the whole run.

use cot_trace::TraceError;
use thiserror::Error;

/// Main error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid arguments or option values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input path or output file could not be accessed
    #[error("File error: {0}")]
    FileError(String),

    /// Unreadable or inconsistent validator configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Report serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Worker or runtime failure
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CliError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        CliError::InvalidInput(msg.into())
    }

    pub fn file_error(msg: impl Into<String>) -> Self {
        CliError::FileError(msg.into())
    }

    /// Check if this is caused by the invocation rather than the tool
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CliError::InvalidInput(_) | CliError::FileError(_) | CliError::ConfigError(_)
        )
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::FileError(err.to_string())
    }
}

impl From<TraceError> for CliError {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::Config(msg) => CliError::ConfigError(msg),
            TraceError::Io(msg) => CliError::FileError(msg),
            TraceError::Serialization(msg) => CliError::SerializationError(msg),
            other => CliError::InternalError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_error_mapping() {
        let err: CliError = TraceError::config("window exceeds threshold").into();
        assert!(matches!(err, CliError::ConfigError(_)));
        assert!(err.is_user_error());

        let err: CliError = TraceError::Serialization("bad".to_string()).into();
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_io_error_is_file_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.md");
        let err: CliError = io.into();
        assert!(matches!(err, CliError::FileError(_)));
        assert_eq!(err.to_string(), "File error: missing.md");
    }
}
