//! Deadline enforcement
//!
//! Races a future against a time budget. The enforcer only stops waiting;
//! stopping the work itself is the execution unit's job.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use warden_foundation::{Error, Result};

/// Wall-clock budget of one task attempt (always > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Deadline(Duration);

impl Deadline {
    pub fn new(duration: Duration) -> Result<Self> {
        if duration.is_zero() {
            return Err(Error::InvalidInput(
                "deadline must be greater than zero".to_string(),
            ));
        }
        Ok(Self(duration))
    }

    pub fn from_millis(ms: u64) -> Result<Self> {
        Self::new(Duration::from_millis(ms))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl TryFrom<u64> for Deadline {
    type Error = Error;

    fn try_from(ms: u64) -> Result<Self> {
        Self::from_millis(ms)
    }
}

impl From<Deadline> for u64 {
    fn from(deadline: Deadline) -> u64 {
        deadline.0.as_millis() as u64
    }
}

impl std::fmt::Display for Deadline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Result of racing work against a deadline
#[derive(Debug, PartialEq, Eq)]
pub enum DeadlineOutcome<T> {
    /// The work finished within budget; its own result, untouched
    Completed(T),

    /// The budget elapsed first
    TimedOut {
        /// Attempts made under this budget (1 for a bare timeout)
        attempts: u32,
    },
}

impl<T> DeadlineOutcome<T> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, DeadlineOutcome::TimedOut { .. })
    }

    pub fn completed(self) -> Option<T> {
        match self {
            DeadlineOutcome::Completed(value) => Some(value),
            DeadlineOutcome::TimedOut { .. } => None,
        }
    }
}

/// Await `work` for at most `deadline`
pub async fn enforce<F>(deadline: Deadline, work: F) -> DeadlineOutcome<F::Output>
where
    F: Future,
{
    match tokio::time::timeout(deadline.duration(), work).await {
        Ok(value) => DeadlineOutcome::Completed(value),
        Err(_) => {
            debug!(deadline = %deadline, "deadline elapsed");
            DeadlineOutcome::TimedOut { attempts: 1 }
        }
    }
}
