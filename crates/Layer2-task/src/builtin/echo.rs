//! `echo` - returns its message

use crate::context::RunContext;
use crate::deadline::Deadline;
use crate::definition::TaskDefinition;
use crate::state::TerminalState;
use crate::task::{Output, RunnableTask};
use async_trait::async_trait;
use tracing::info;
use warden_foundation::{Error, Result};

pub struct EchoTask {
    message: String,
    final_state: Option<TerminalState>,
    timeout: Option<Deadline>,
}

impl EchoTask {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            final_state: None,
            timeout: None,
        }
    }

    /// Properties: `message` (required), `finalState` (optional override)
    pub fn from_definition(def: &TaskDefinition) -> Result<Self> {
        let final_state = def
            .property::<String>("finalState")?
            .map(|s| s.parse::<TerminalState>().map_err(Error::Config))
            .transpose()?;

        Ok(Self {
            message: def.required("message")?,
            final_state,
            timeout: def.timeout()?,
        })
    }

    pub fn with_final_state(mut self, state: TerminalState) -> Self {
        self.final_state = Some(state);
        self
    }
}

#[async_trait]
impl RunnableTask for EchoTask {
    fn task_type(&self) -> &str {
        "echo"
    }

    fn timeout(&self) -> Option<Deadline> {
        self.timeout
    }

    async fn run(&self, _context: &RunContext) -> Result<Output> {
        info!(message = %self.message, "echo");

        let output = Output::new().with("message", self.message.clone());
        Ok(match self.final_state {
            Some(state) => output.with_final_state(state),
            None => output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskRun;

    #[tokio::test]
    async fn test_echo_override() {
        let def = TaskDefinition::new("e", "echo")
            .with_property("message", "hi")
            .with_property("finalState", "failed");
        let task = EchoTask::from_definition(&def).unwrap();

        let ctx = RunContext::new(TaskRun::new("e", "echo"));
        let output = task.run(&ctx).await.unwrap();
        assert_eq!(output.get("message").unwrap(), "hi");
        assert_eq!(output.final_state(), Some(TerminalState::Failed));
    }

    #[test]
    fn test_bad_final_state() {
        let def = TaskDefinition::new("e", "echo")
            .with_property("message", "hi")
            .with_property("finalState", "WARNING");
        assert!(matches!(
            EchoTask::from_definition(&def),
            Err(Error::Config(_))
        ));
    }
}
