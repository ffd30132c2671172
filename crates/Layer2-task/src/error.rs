//! Errors of the execution envelope

use std::time::Duration;
use warden_foundation::Error;

/// Why a task attempt did not succeed (or why `execute` was refused)
#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    /// The task did not return within its configured budget
    #[error("Task exceeded its deadline of {duration:?}")]
    DeadlineExceeded { duration: Duration, attempts: u32 },

    /// The task's own logic failed; the original error is kept unmodified
    #[error("Task raised an error: {0}")]
    TaskRaised(#[source] Error),

    /// The task panicked inside `run`
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// `execute` was called a second time on the same unit
    #[error("Execution unit already executed")]
    AlreadyExecuted,
}

impl ExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::DeadlineExceeded { .. })
    }

    /// Configured deadline, when this is a timeout
    pub fn deadline(&self) -> Option<Duration> {
        match self {
            ExecutionError::DeadlineExceeded { duration, .. } => Some(*duration),
            _ => None,
        }
    }

    /// Original task error, when the task raised one
    pub fn task_error(&self) -> Option<&Error> {
        match self {
            ExecutionError::TaskRaised(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExecutionError> for Error {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::DeadlineExceeded { duration, .. } => Error::Timeout { duration },
            ExecutionError::TaskRaised(inner) => inner,
            ExecutionError::Panicked(msg) => Error::Task(format!("panicked: {}", msg)),
            ExecutionError::AlreadyExecuted => {
                Error::Internal("execution unit already executed".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_deadline_exceeded() {
        let err = ExecutionError::DeadlineExceeded {
            duration: Duration::from_millis(200),
            attempts: 1,
        };
        assert!(err.is_timeout());
        assert_eq!(err.deadline(), Some(Duration::from_millis(200)));
        assert_eq!(err.to_string(), "Task exceeded its deadline of 200ms");

        let converted: Error = err.into();
        assert!(converted.is_retryable());
    }

    #[test]
    fn test_task_raised_keeps_source() {
        let err = ExecutionError::TaskRaised(Error::task_failed("fail", "bad input"));
        assert!(!err.is_timeout());
        assert!(err.task_error().unwrap().is_task_error());
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("Task failed: fail - bad input".to_string())
        );
    }
}
