//! Terminal outcome of an attempt and the reporter that consumes it

use crate::error::ExecutionError;
use crate::state::TerminalState;
use crate::task::{Output, TaskRun};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// Terminal `(state, output, error)` of one attempt
#[derive(Debug)]
pub struct TaskOutcome {
    pub state: TerminalState,

    /// Present only when the task's own return decided the outcome
    pub output: Option<Output>,

    /// Present for timeouts and task errors; absent for kills and overrides
    pub error: Option<ExecutionError>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,
}

impl TaskOutcome {
    pub(crate) fn new(
        state: TerminalState,
        output: Option<Output>,
        error: Option<ExecutionError>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state,
            output,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().map(|e| e.is_timeout()).unwrap_or(false)
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// JSON summary for publication
    pub fn to_json(&self) -> Value {
        json!({
            "state": self.state,
            "output": self.output.as_ref().map(|o| o.values().clone()),
            "error": self.error.as_ref().map(|e| e.to_string()),
            "timeoutMs": self
                .error
                .as_ref()
                .and_then(|e| e.deadline())
                .map(|d| d.as_millis() as u64),
            "startedAt": self.started_at,
            "finishedAt": self.finished_at,
            "durationMs": self.duration().as_millis() as u64,
        })
    }
}

/// Downstream consumer of terminal outcomes
pub trait OutcomeReporter: Send + Sync {
    fn report(&self, task_run: &TaskRun, outcome: &TaskOutcome);
}

/// Reporter that logs one line per outcome
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOutcomeReporter;

impl OutcomeReporter for LoggingOutcomeReporter {
    fn report(&self, task_run: &TaskRun, outcome: &TaskOutcome) {
        info!(
            task_id = %task_run.task_id,
            task_run_id = %task_run.id,
            state = %outcome.state,
            duration_ms = outcome.duration().as_millis() as u64,
            "Task attempt finished"
        );
    }
}
