//! Error types for trace parsing and validation
//!
//! Only document-level failures surface as [`TraceError`]. Problems that are
//! local to one evidence item or one check are recorded in the parsed model or
//! the verdict and never abort validation of the rest of the document.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for trace operations
#[derive(Error, Debug)]
pub enum TraceError {
    /// The text does not contain a recognizable trace document
    #[error("Parse error: {0}")]
    Parse(String),

    /// A timestamp could not be read
    #[error("Timestamp error: {0}")]
    TimestampFormat(#[from] TimestampFormatError),

    /// Unresolved or unsupported schema version
    #[error("Schema error: {0}")]
    Schema(String),

    /// Decision chain violation
    #[error("Recursion error: {0}")]
    Recursion(#[from] RecursionError),

    /// Invalid validator configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// File access or I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TraceError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        TraceError::Parse(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        TraceError::Schema(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        TraceError::Config(msg.into())
    }

    /// Check if this is caused by the input rather than the validator
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TraceError::Parse(_)
                | TraceError::TimestampFormat(_)
                | TraceError::Schema(_)
                | TraceError::Config(_)
                | TraceError::Io(_)
        )
    }
}

impl From<std::io::Error> for TraceError {
    fn from(err: std::io::Error) -> Self {
        TraceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TraceError {
    fn from(err: serde_json::Error) -> Self {
        TraceError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for TraceError {
    fn from(err: serde_yaml::Error) -> Self {
        TraceError::Serialization(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for TraceError {
    fn from(err: toml::de::Error) -> Self {
        TraceError::Config(format!("TOML error: {}", err))
    }
}

/// An unreadable timestamp on a single evidence item
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("invalid {field} timestamp '{raw}': {reason}")]
pub struct TimestampFormatError {
    /// Which sub-field carried the value (created, modified, accessed)
    pub field: String,
    /// The text as it appeared in the document
    pub raw: String,
    /// Why it was rejected
    pub reason: String,
}

/// Decision chain violations raised by the recursion tracker
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecursionError {
    /// A spawn would go deeper than the declared maximum
    #[error("RECURSION_LIMIT_EXCEEDED: attempted depth={attempted} max={max}")]
    LimitExceeded { attempted: u32, max: u32 },

    /// A decision reappeared in its own chain
    #[error("CYCLE_DETECTED: decision '{id}' already in chain")]
    CycleDetected { id: String },

    /// The chain already halted; further spawns are rejected
    #[error("CHAIN_HALTED: chain already halted by {reason}")]
    Halted { reason: String },
}

impl RecursionError {
    /// The stable code used in verdict reasons
    pub fn code(&self) -> &'static str {
        match self {
            RecursionError::LimitExceeded { .. } => "RECURSION_LIMIT_EXCEEDED",
            RecursionError::CycleDetected { .. } => "CYCLE_DETECTED",
            RecursionError::Halted { .. } => "CHAIN_HALTED",
        }
    }
}

/// Result type alias for trace operations
pub type Result<T> = std::result::Result<T, TraceError>;
