//! Error types module
//!
//! All failures surfaced by the document store, the attachment backends and the
//! repository workflows are unified under the `AppError` enum.
//!
//! The taxonomy is small on purpose: `Conflict` (stale revision), `NotFound`,
//! `InvalidArgument`, `Backend` (transport or storage failure from either
//! backend) and `PartialFailure` (some items of a batch failed while others
//! succeeded).

use std::io;

use crate::models::ItemFailure;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like missing documents
    Debug,
    /// Warning level - for recoverable issues like concurrent modification
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be reported and whether a caller
/// may retry the operation that produced it.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "REVISION_CONFLICT")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The supplied revision does not match the stored one.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend error: {message}")]
    BackendWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// Some items of a batch failed; `succeeded` lists the ids that were applied.
    #[error("Partial failure: {} succeeded, {} failed", succeeded.len(), failures.len())]
    PartialFailure {
        succeeded: Vec<String>,
        failures: Vec<ItemFailure>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::BackendWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => AppError::NotFound(err.to_string()),
            _ => AppError::Backend(format!("IO error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(format!("JSON error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AppError::Conflict(_) => (
            "REVISION_CONFLICT",
            true,
            Some("Re-read the document and retry the whole operation"),
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            "NOT_FOUND",
            false,
            Some("Verify the document id exists"),
            LogLevel::Debug,
        ),
        AppError::InvalidArgument(_) => (
            "INVALID_ARGUMENT",
            false,
            Some("Check the arguments and try again"),
            LogLevel::Debug,
        ),
        AppError::Backend(_) | AppError::BackendWithSource { .. } => (
            "BACKEND_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::PartialFailure { .. } => (
            "PARTIAL_FAILURE",
            true,
            Some("Inspect the failed items and retry them individually"),
            LogLevel::Warn,
        ),
        AppError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Fix the configuration and restart"),
            LogLevel::Error,
        ),
        AppError::Serialization(_) => ("SERIALIZATION_ERROR", false, None, LogLevel::Error),
        AppError::Internal(_) => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error reports
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Conflict(_) => "Conflict",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidArgument(_) => "InvalidArgument",
            AppError::Backend(_) | AppError::BackendWithSource { .. } => "Backend",
            AppError::PartialFailure { .. } => "PartialFailure",
            AppError::Config(_) => "Config",
            AppError::Serialization(_) => "Serialization",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }
}
