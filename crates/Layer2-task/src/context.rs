//! Execution context handed to a task for one attempt

use crate::task::TaskRun;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::Span;
use warden_foundation::{Error, Result};

/// Task-scoped state for one attempt
///
/// Built by the engine (variables already resolved) and owned by the
/// execution unit for the duration of the attempt.
#[derive(Debug)]
pub struct RunContext {
    task_run: TaskRun,
    variables: Map<String, Value>,
    span: Span,
}

impl RunContext {
    pub fn new(task_run: TaskRun) -> Self {
        let span = tracing::info_span!(
            "task_run",
            task_id = %task_run.task_id,
            task_type = %task_run.task_type,
            task_run_id = %task_run.id,
            attempt = task_run.attempt,
        );

        Self {
            task_run,
            variables: Map::new(),
            span,
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn task_run(&self) -> &TaskRun {
        &self.task_run
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Typed variable lookup
    pub fn variable_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.variables
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    Error::InvalidInput(format!("variable '{}' has the wrong type: {}", key, e))
                })
            })
            .transpose()
    }

    /// Logger handle: span every event of this attempt is recorded under
    pub fn logger(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variables() {
        let ctx = RunContext::new(TaskRun::new("t1", "echo"))
            .with_variable("name", "world")
            .with_variable("retries", 3);

        assert_eq!(ctx.variable("name"), Some(&json!("world")));
        assert_eq!(ctx.variable_as::<u32>("retries").unwrap(), Some(3));
        assert_eq!(ctx.variable_as::<u32>("missing").unwrap(), None);
        assert!(ctx.variable_as::<u32>("name").is_err());
        assert_eq!(ctx.task_run().task_id, "t1");
    }
}
