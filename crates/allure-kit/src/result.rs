//! Result and error types for allure-kit.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for reporting operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur while reporting
#[derive(Debug, Error)]
pub enum ReportError {
    /// The reporter was initialized twice
    #[error("Reporter has already been initialized")]
    AlreadyInitialized,

    /// A lifecycle hook ran before initialization
    #[error("Reporter must be initialized before {operation}")]
    NotInitialized {
        /// Operation that was attempted
        operation: String,
    },

    /// Invalid or missing configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Screenshot or diagnostic capture failed
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// A file operation kept failing after every retry
    #[error("{operation} failed for {} after {attempts} attempt(s): {source}", path.display())]
    RetriesExhausted {
        /// Operation name (e.g. "create directory")
        operation: &'static str,
        /// Path the operation targeted
        path: PathBuf,
        /// Number of attempts made
        attempts: u32,
        /// Last error observed
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a screenshot error
    #[must_use]
    pub fn screenshot(message: impl Into<String>) -> Self {
        Self::Screenshot {
            message: message.into(),
        }
    }

    /// Create a not-initialized error for the given operation
    #[must_use]
    pub fn not_initialized(operation: impl Into<String>) -> Self {
        Self::NotInitialized {
            operation: operation.into(),
        }
    }

    /// Whether this error must abort the run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInitialized | Self::NotInitialized { .. } | Self::Config { .. }
        )
    }
}
