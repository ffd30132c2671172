//! `sleep` - waits, and wakes up early when stopped

use crate::context::RunContext;
use crate::deadline::Deadline;
use crate::definition::TaskDefinition;
use crate::task::{Output, RunnableTask};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;
use warden_foundation::{Error, Result};

pub struct SleepTask {
    duration: Duration,
    timeout: Option<Deadline>,
    stopped: AtomicBool,
    stop: Notify,
}

impl SleepTask {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            timeout: None,
            stopped: AtomicBool::new(false),
            stop: Notify::new(),
        }
    }

    /// Properties: `durationMs` (required)
    pub fn from_definition(def: &TaskDefinition) -> Result<Self> {
        let mut task = Self::new(Duration::from_millis(def.required("durationMs")?));
        task.timeout = def.timeout()?;
        Ok(task)
    }
}

#[async_trait]
impl RunnableTask for SleepTask {
    fn task_type(&self) -> &str {
        "sleep"
    }

    fn timeout(&self) -> Option<Deadline> {
        self.timeout
    }

    async fn run(&self, _context: &RunContext) -> Result<Output> {
        debug!(duration = ?self.duration, "sleeping");

        tokio::select! {
            _ = tokio::time::sleep(self.duration) => {
                Ok(Output::new().with("sleptMs", self.duration.as_millis() as u64))
            }
            _ = self.stop.notified() => Err(Error::Cancelled),
        }
    }

    async fn kill(&self) -> Result<()> {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            // Stores a permit when `run` is not waiting yet
            self.stop.notify_one();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskRun;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sleep_completes() {
        let task = SleepTask::new(Duration::from_millis(10));
        let ctx = RunContext::new(TaskRun::new("s", "sleep"));
        let output = task.run(&ctx).await.unwrap();
        assert_eq!(output.get("sleptMs").unwrap(), 10);
    }

    #[tokio::test]
    async fn test_kill_wakes_sleeper() {
        let task = Arc::new(SleepTask::new(Duration::from_secs(60)));
        let ctx = RunContext::new(TaskRun::new("s", "sleep"));

        let runner = Arc::clone(&task);
        let handle = tokio::spawn(async move { runner.run(&ctx).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        task.kill().await.unwrap();
        task.kill().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
