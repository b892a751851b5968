//! Regression error types.
//!
//! A failed comparison is *not* an error: it is reported through
//! [`Verdict`](crate::Verdict). Errors are reserved for bad input, bad
//! configuration and artifacts that cannot be read back.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed decode error wrapped by [`RegressError::CorruptArtifact`].
pub type DecodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for regression checks.
#[derive(Debug, Error)]
pub enum RegressError {
    /// Input rejected before anything touched the disk.
    #[error("invalid input for '{key}': {message}")]
    Validation { key: String, message: String },

    /// An artifact exists but could not be decoded.
    #[error("artifact {} could not be loaded. Corrupt? ({source})", path.display())]
    CorruptArtifact {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// Configuration file or value is invalid.
    #[error("config error: {message}")]
    Config { message: String },

    /// Value could not be serialized into an artifact.
    #[error("serialization error: {message}")]
    Serialize { message: String },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RegressError {
    /// Create a validation error for the given key.
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a corrupt-artifact error wrapping the decode failure.
    pub fn corrupt(path: impl Into<PathBuf>, source: impl Into<DecodeError>) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }

    /// Stable error type string, suitable for machine-readable output.
    pub fn error_type(&self) -> &'static str {
        match self {
            RegressError::Validation { .. } => "validation_error",
            RegressError::CorruptArtifact { .. } => "corrupt_artifact",
            RegressError::Config { .. } => "config_error",
            RegressError::Serialize { .. } => "serialize_error",
            RegressError::Io(_) => "io_error",
        }
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, RegressError::Validation { .. })
    }

    /// Check if this is a corrupt-artifact error.
    pub fn is_corrupt_artifact(&self) -> bool {
        matches!(self, RegressError::CorruptArtifact { .. })
    }
}

pub type Result<T> = std::result::Result<T, RegressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_type_strings_are_stable() {
        assert_eq!(
            RegressError::validation("a", "bad").error_type(),
            "validation_error"
        );
        assert_eq!(RegressError::config("x").error_type(), "config_error");
        let io = RegressError::from(std::io::Error::other("boom"));
        assert_eq!(io.error_type(), "io_error");
    }

    #[test]
    fn corrupt_artifact_names_path_and_cause() {
        let err = RegressError::corrupt("/tmp/x.baseline.npz", "bad zip header");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x.baseline.npz"));
        assert!(msg.contains("bad zip header"));
        assert!(err.is_corrupt_artifact());
        assert!(std::error::Error::source(&err).is_some());
    }
}
