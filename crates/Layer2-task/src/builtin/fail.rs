//! `fail` - always raises

use crate::context::RunContext;
use crate::deadline::Deadline;
use crate::definition::TaskDefinition;
use crate::task::{Output, RunnableTask};
use async_trait::async_trait;
use warden_foundation::{Error, Result};

pub struct FailTask {
    message: String,
    timeout: Option<Deadline>,
}

impl FailTask {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: None,
        }
    }

    /// Properties: `message` (optional)
    pub fn from_definition(def: &TaskDefinition) -> Result<Self> {
        Ok(Self {
            message: def
                .property("message")?
                .unwrap_or_else(|| "task failed on purpose".to_string()),
            timeout: def.timeout()?,
        })
    }
}

#[async_trait]
impl RunnableTask for FailTask {
    fn task_type(&self) -> &str {
        "fail"
    }

    fn timeout(&self) -> Option<Deadline> {
        self.timeout
    }

    async fn run(&self, _context: &RunContext) -> Result<Output> {
        Err(Error::task_failed("fail", self.message.clone()))
    }
}
