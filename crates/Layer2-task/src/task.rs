//! Task capability and its output

use crate::context::RunContext;
use crate::deadline::Deadline;
use crate::state::TerminalState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use warden_foundation::Result;

/// Unique identifier of one task attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRunId(pub Uuid);

impl TaskRunId {
    /// Generate a new random TaskRunId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Identity of the attempt a unit executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    pub id: TaskRunId,

    /// Id of the task in its flow definition
    pub task_id: String,

    /// Registered type name of the task
    pub task_type: String,

    /// Attempt number assigned by the engine, starting at 1
    pub attempt: u32,
}

impl TaskRun {
    pub fn new(task_id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: TaskRunId::new(),
            task_id: task_id.into(),
            task_type: task_type.into(),
            attempt: 1,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// Value produced by a successful `run`
///
/// A task that returns normally but wants a different terminal state sets
/// `final_state`; the unit honours it instead of SUCCESS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    #[serde(default)]
    values: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_state: Option<TerminalState>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Request a terminal state other than SUCCESS
    pub fn with_final_state(mut self, state: TerminalState) -> Self {
        self.final_state = Some(state);
        self
    }

    pub fn final_state(&self) -> Option<TerminalState> {
        self.final_state
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

/// Capability the execution unit runs
///
/// `run` is executed on its own tokio task. `kill` is called from a
/// different task than the one running `run`, possibly while `run` is
/// making progress, and may be called after `run` returned; implementations
/// must guard their own state accordingly and keep `kill` idempotent.
#[async_trait]
pub trait RunnableTask: Send + Sync {
    /// Registered type name, used in logs and metric tags
    fn task_type(&self) -> &str;

    /// Deadline declared by the task configuration (`None` = unbounded)
    fn timeout(&self) -> Option<Deadline> {
        None
    }

    /// Do the work
    async fn run(&self, context: &RunContext) -> Result<Output>;

    /// Ask a running `run` to stop early
    async fn kill(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_builder() {
        let output = Output::new()
            .with("exitCode", 0)
            .with("stdout", "hello")
            .with_final_state(TerminalState::Failed);

        assert_eq!(output.get("exitCode"), Some(&json!(0)));
        assert_eq!(output.get("stdout"), Some(&json!("hello")));
        assert_eq!(output.final_state(), Some(TerminalState::Failed));
        assert_eq!(output.values().len(), 2);
    }

    #[test]
    fn test_output_without_override() {
        let output = Output::new().with("value", 1);
        assert_eq!(output.final_state(), None);

        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value, json!({ "values": { "value": 1 } }));
    }

    #[test]
    fn test_task_run_defaults() {
        let run = TaskRun::new("hello", "echo");
        assert_eq!(run.attempt, 1);
        assert_eq!(run.with_attempt(3).attempt, 3);
    }

    #[test]
    fn test_task_run_id_display() {
        let id = TaskRunId::new();
        assert_eq!(id.to_string().len(), 8);
    }
}
