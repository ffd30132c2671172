//! Error types for Warden
//!
//! Shared error enum for every layer of the workspace.

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Warden error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Task execution
    // ========================================================================
    #[error("Task error: {0}")]
    Task(String),

    #[error("Task failed: {task} - {message}")]
    TaskFailed { task: String, message: String },

    #[error("Timeout exceeded ({duration:?})")]
    Timeout { duration: Duration },

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // General
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Other
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a retry layer may attempt the work again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Io(_))
    }

    /// Whether the error came from the task's own logic rather than the runtime
    pub fn is_task_error(&self) -> bool {
        matches!(self, Error::Task(_) | Error::TaskFailed { .. })
    }

    /// Task failure helper
    pub fn task_failed(task: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TaskFailed {
            task: task.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From conversions
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
