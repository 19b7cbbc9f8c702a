//! Error types for orrery.
//!
//! Only the ambient surface of the crate is fallible: configuration loading
//! and snapshot encoding/decoding return `Result<T, OrreryError>`. Violations
//! of the caller protocol (unknown indices, time going backward, structural
//! changes after initialization) are programmer errors and are reported by
//! fatal assertions instead, so they never appear here.

use thiserror::Error;

/// Result type alias for orrery operations.
pub type OrreryResult<T> = Result<T, OrreryError>;

/// Unified error type for the fallible surface of the crate.
#[derive(Debug, Error)]
pub enum OrreryError {
    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // ===== Persistence Errors =====
    /// Snapshot encoding or decoding error.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrreryError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a snapshot error.
    #[must_use]
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot(message.into())
    }
}
