//! Error types for artifact loading and request validation

use std::path::PathBuf;
use thiserror::Error;

/// Failure to construct a predictor from its artifacts or configuration.
///
/// Fatal for the predictor instance being built.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("threshold must lie in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Per-call input failure. Raised before any scoring happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("request must be a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("cannot parse departure timestamp '{0}'")]
    InvalidTimestamp(String),
}

impl ValidationError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingField(field.to_string())
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field, when the error concerns a single field
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field) | Self::InvalidField { field, .. } => Some(field),
            Self::InvalidTimestamp(_) => Some(crate::models::DEPARTURE_DATETIME),
            Self::NotAnObject => None,
        }
    }
}
