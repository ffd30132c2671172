//! Built-in task implementations
//!
//! - `echo`: returns a message, optionally overriding the final state
//! - `sleep`: waits for `durationMs`, stops early on kill
//! - `fail`: always raises
//! - `shell`: runs a command through the configured interpreter

mod echo;
mod fail;
mod shell;
mod sleep;

pub use echo::EchoTask;
pub use fail::FailTask;
pub use shell::ShellTask;
pub use sleep::SleepTask;

use crate::definition::TaskDefinition;
use crate::task::RunnableTask;
use std::sync::Arc;
use warden_foundation::{Error, Result, WorkerConfig};

/// Task types understood by [`from_definition`]
pub const BUILTIN_TYPES: &[&str] = &["echo", "sleep", "fail", "shell"];

/// Build a runnable task from its definition
pub fn from_definition(
    def: &TaskDefinition,
    config: &WorkerConfig,
) -> Result<Arc<dyn RunnableTask>> {
    let task: Arc<dyn RunnableTask> = match def.task_type.as_str() {
        "echo" => Arc::new(EchoTask::from_definition(def)?),
        "sleep" => Arc::new(SleepTask::from_definition(def)?),
        "fail" => Arc::new(FailTask::from_definition(def)?),
        "shell" => Arc::new(ShellTask::from_definition(def, &config.shell)?),
        other => {
            return Err(Error::NotFound(format!(
                "unknown task type '{}' (expected one of: {})",
                other,
                BUILTIN_TYPES.join(", ")
            )))
        }
    };
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builds_known_types() {
        let config = WorkerConfig::default();
        let def = TaskDefinition::new("s", "sleep")
            .with_timeout_ms(50)
            .with_property("durationMs", 1000);

        let task = from_definition(&def, &config).unwrap();
        assert_eq!(task.task_type(), "sleep");
        assert_eq!(
            task.timeout().map(|d| d.duration()),
            Some(Duration::from_millis(50))
        );
    }

    #[test]
    fn test_unknown_type() {
        let def = TaskDefinition::new("x", "teleport");
        let err = from_definition(&def, &WorkerConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_missing_property() {
        let def = TaskDefinition::new("e", "echo");
        assert!(matches!(
            from_definition(&def, &WorkerConfig::default()),
            Err(Error::Config(_))
        ));
    }
}
