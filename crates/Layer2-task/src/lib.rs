//! # warden-task
//!
//! Bounded, cancellable execution of a single task attempt.
//!
//! ## Features
//!
//! - Isolated execution of a `RunnableTask` on its own tokio task
//! - Optional wall-clock deadline, counted in `worker.timeout.count`
//! - Idempotent kill: cooperative stop first, forcible abort always
//! - Write-once terminal state (SUCCESS / FAILED / KILLED)
//! - Built-in `echo`, `sleep`, `fail` and `shell` tasks
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_foundation::NoopMetricRegistry;
//! use warden_task::{builtin::EchoTask, RunContext, TaskRun, WorkerTaskUnit};
//!
//! # async fn demo() {
//! let unit = WorkerTaskUnit::new(
//!     Arc::new(EchoTask::new("hello")),
//!     RunContext::new(TaskRun::new("greet", "echo")),
//!     Arc::new(NoopMetricRegistry),
//! );
//! let outcome = unit.execute().await;
//! # }
//! ```

pub mod builtin;
pub mod context;
pub mod deadline;
pub mod definition;
pub mod error;
pub mod handler;
pub mod outcome;
pub mod state;
pub mod task;
pub mod unit;

// Execution unit
pub use unit::{KillSwitch, WorkerTaskUnit};

// Task model
pub use context::RunContext;
pub use definition::TaskDefinition;
pub use state::{StateCell, TerminalState};
pub use task::{Output, RunnableTask, TaskRun, TaskRunId};

// Deadline
pub use deadline::{enforce, Deadline, DeadlineOutcome};

// Results and errors
pub use error::ExecutionError;
pub use handler::{ExceptionHandler, LoggingExceptionHandler};
pub use outcome::{LoggingOutcomeReporter, OutcomeReporter, TaskOutcome};
