//! Exception handler invoked for every failed attempt

use crate::error::ExecutionError;
use crate::task::TaskRun;
use tracing::error;

/// Receives every error an attempt ends with (timeouts and task errors)
///
/// Classification (retry, alert, ignore) belongs here, not in the unit.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, task_run: &TaskRun, error: &ExecutionError);
}

/// Default handler: log the failure
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExceptionHandler;

impl ExceptionHandler for LoggingExceptionHandler {
    fn handle(&self, task_run: &TaskRun, err: &ExecutionError) {
        let retryable = match err {
            ExecutionError::DeadlineExceeded { .. } => true,
            ExecutionError::TaskRaised(inner) => inner.is_retryable(),
            _ => false,
        };

        error!(
            task_id = %task_run.task_id,
            task_type = %task_run.task_type,
            attempt = task_run.attempt,
            retryable,
            error = %err,
            "Task attempt failed"
        );
    }
}
