//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reporting library error
    #[error("{0}")]
    Report(#[from] allure_kit::ReportError),
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Process exit code: 2 for configuration and lifecycle errors, 1 otherwise
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Report(err) if err.is_fatal() => 2,
            _ => 1,
        }
    }
}
