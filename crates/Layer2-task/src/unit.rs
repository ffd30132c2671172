//! Worker task unit - bounded, cancellable execution of one task attempt
//!
//! The unit spawns `RunnableTask::run` on its own tokio task and waits for
//! the first of three events:
//! - the task returns (success, override state, or error)
//! - the deadline elapses (timeout counter, kill, FAILED)
//! - someone calls `kill` (cooperative stop, then abort)
//!
//! Whichever event reaches the terminal state cell first decides the
//! outcome; the others observe the stored state and back off.

use crate::context::RunContext;
use crate::deadline::{self, Deadline, DeadlineOutcome};
use crate::error::ExecutionError;
use crate::handler::{ExceptionHandler, LoggingExceptionHandler};
use crate::outcome::{OutcomeReporter, TaskOutcome};
use crate::state::{StateCell, TerminalState};
use crate::task::{Output, RunnableTask, TaskRun};
use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, info, warn, Instrument};
use warden_foundation::{
    tags, MetricRegistry, Result, METRIC_WORKER_TIMEOUT_COUNT, TAG_ATTEMPT_COUNT, TAG_TASK_ID,
    TAG_TASK_TYPE,
};

/// Upper bound on how long a cooperative stop may take before the abort
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// State shared between the unit and its kill switches
struct Shared {
    task: Arc<dyn RunnableTask>,
    task_run: TaskRun,
    state: StateCell,
    kill_requested: AtomicBool,
    abort: Mutex<Option<AbortHandle>>,
    stop_timeout: Duration,
}

impl Shared {
    /// Claim the terminal state for a stop; only one caller ever wins
    fn claim(&self, target: TerminalState) -> bool {
        match self.state.try_set(target) {
            Ok(()) => {
                self.kill_requested.store(true, Ordering::SeqCst);
                true
            }
            Err(existing) => {
                debug!(
                    task_id = %self.task_run.task_id,
                    state = %existing,
                    "attempt already terminal, nothing to kill"
                );
                false
            }
        }
    }

    /// Cooperative stop, then forcible abort. Caller must hold the claim.
    async fn stop(&self) {
        // Aborts on drop, so the forcible stop runs even if the
        // cooperative call panics or this future is dropped mid-way.
        let _forcible = ForcibleStop(&self.abort);

        let stop = AssertUnwindSafe(self.task.kill()).catch_unwind();
        match tokio::time::timeout(self.stop_timeout, stop).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                warn!(task_id = %self.task_run.task_id, error = %e, "Error while killing task");
            }
            Ok(Err(_)) => {
                warn!(task_id = %self.task_run.task_id, "Task panicked while being killed");
            }
            Err(_) => {
                warn!(
                    task_id = %self.task_run.task_id,
                    stop_timeout = ?self.stop_timeout,
                    "Task did not stop cooperatively in time"
                );
            }
        }
    }

    async fn kill(&self, target: TerminalState) -> bool {
        if !self.claim(target) {
            return false;
        }

        info!(
            task_id = %self.task_run.task_id,
            target = %target,
            "Killing task"
        );
        self.stop().await;
        true
    }

    /// Register the running execution; abort right away if a kill won the race
    fn arm(&self, handle: AbortHandle) {
        *self.abort.lock() = Some(handle.clone());
        if self.kill_requested.load(Ordering::SeqCst) {
            handle.abort();
        }
    }
}

struct ForcibleStop<'a>(&'a Mutex<Option<AbortHandle>>);

impl Drop for ForcibleStop<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.0.lock().as_ref() {
            handle.abort();
        }
    }
}

/// Cloneable handle to kill a unit from anywhere
#[derive(Clone)]
pub struct KillSwitch {
    shared: Arc<Shared>,
}

impl KillSwitch {
    /// See [`WorkerTaskUnit::kill`]
    pub async fn kill(&self, target: TerminalState) -> bool {
        self.shared.kill(target).await
    }

    pub fn is_kill_requested(&self) -> bool {
        self.shared.kill_requested.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for KillSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KillSwitch")
            .field("task_id", &self.shared.task_run.task_id)
            .field("kill_requested", &self.is_kill_requested())
            .finish()
    }
}

/// Execution envelope around exactly one task attempt
pub struct WorkerTaskUnit {
    shared: Arc<Shared>,
    context: Arc<RunContext>,
    metrics: Arc<dyn MetricRegistry>,
    handler: Arc<dyn ExceptionHandler>,
    deadline: Option<Deadline>,
    executed: AtomicBool,
}

impl WorkerTaskUnit {
    /// Create a unit; the deadline defaults to the task's declared timeout
    pub fn new(
        task: Arc<dyn RunnableTask>,
        context: RunContext,
        metrics: Arc<dyn MetricRegistry>,
    ) -> Self {
        let deadline = task.timeout();
        let task_run = context.task_run().clone();

        Self {
            shared: Arc::new(Shared {
                task,
                task_run,
                state: StateCell::new(),
                kill_requested: AtomicBool::new(false),
                abort: Mutex::new(None),
                stop_timeout: DEFAULT_STOP_TIMEOUT,
            }),
            context: Arc::new(context),
            metrics,
            handler: Arc::new(LoggingExceptionHandler),
            deadline,
            executed: AtomicBool::new(false),
        }
    }

    /// Override the deadline (`None` disables enforcement)
    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Bound the cooperative part of `kill`
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.stop_timeout = stop_timeout,
            None => warn!("kill switch already handed out, stop timeout unchanged"),
        }
        self
    }

    pub fn task_run(&self) -> &TaskRun {
        &self.shared.task_run
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Terminal state, `None` while running
    pub fn state(&self) -> Option<TerminalState> {
        self.shared.state.get()
    }

    /// True once a kill or the deadline has claimed the attempt
    pub fn is_kill_requested(&self) -> bool {
        self.shared.kill_requested.load(Ordering::SeqCst)
    }

    pub fn kill_switch(&self) -> KillSwitch {
        KillSwitch {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop the attempt and mark it `target` (KILLED or FAILED)
    ///
    /// Calls `RunnableTask::kill` (failures are logged and swallowed), then
    /// aborts the execution whatever the cooperative call did. Idempotent:
    /// returns `true` only for the call that actually killed the attempt.
    pub async fn kill(&self, target: TerminalState) -> bool {
        self.shared.kill(target).await
    }

    /// Run the attempt to its terminal outcome. Callable once.
    pub async fn execute(&self) -> std::result::Result<TaskOutcome, ExecutionError> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(ExecutionError::AlreadyExecuted);
        }

        let started_at = Utc::now();
        let task_run = &self.shared.task_run;

        if let Some(state) = self.shared.state.get() {
            info!(task_id = %task_run.task_id, state = %state, "Task killed before start");
            return Ok(TaskOutcome::new(state, None, None, started_at));
        }

        // Everything the task logs resolves against its own span
        let span = tracing::info_span!(
            parent: self.context.logger(),
            "worker_task",
            implementation = self.shared.task.task_type(),
        );

        let task = Arc::clone(&self.shared.task);
        let context = Arc::clone(&self.context);
        let mut handle =
            tokio::spawn(async move { task.run(&context).await }.instrument(span));
        self.shared.arm(handle.abort_handle());

        debug!(
            task_id = %task_run.task_id,
            deadline = ?self.deadline.map(|d| d.duration()),
            "Task started"
        );

        let joined = match self.deadline {
            Some(deadline) => {
                let raced = deadline::enforce(deadline, &mut handle).await;
                match raced {
                    DeadlineOutcome::Completed(joined) => joined,
                    DeadlineOutcome::TimedOut { attempts } => {
                        return Ok(self.on_timeout(deadline, attempts, handle, started_at).await);
                    }
                }
            }
            None => handle.await,
        };

        Ok(self.finalize(joined, started_at))
    }

    /// `execute`, then hand the outcome to `reporter`
    pub async fn execute_and_report(
        &self,
        reporter: &dyn OutcomeReporter,
    ) -> std::result::Result<TaskOutcome, ExecutionError> {
        let outcome = self.execute().await?;
        reporter.report(&self.shared.task_run, &outcome);
        Ok(outcome)
    }

    async fn on_timeout(
        &self,
        deadline: Deadline,
        attempts: u32,
        handle: JoinHandle<Result<Output>>,
        started_at: chrono::DateTime<Utc>,
    ) -> TaskOutcome {
        let task_run = &self.shared.task_run;

        if !self.shared.claim(TerminalState::Failed) {
            // A kill got there first; its outcome stands
            debug!(task_id = %task_run.task_id, "Deadline elapsed during kill");
            let joined = handle.await;
            let state = self.shared.state.settle(TerminalState::Failed);
            self.forward_late(joined);
            return TaskOutcome::new(state, None, None, started_at);
        }

        warn!(
            task_id = %task_run.task_id,
            deadline = %deadline,
            "Task exceeded its deadline"
        );

        self.metrics.counter(
            METRIC_WORKER_TIMEOUT_COUNT,
            &tags([
                (TAG_TASK_ID, task_run.task_id.clone()),
                (TAG_TASK_TYPE, task_run.task_type.clone()),
                (TAG_ATTEMPT_COUNT, attempts.to_string()),
            ]),
        );

        self.shared.stop().await;

        let error = ExecutionError::DeadlineExceeded {
            duration: deadline.duration(),
            attempts,
        };
        self.handler.handle(task_run, &error);
        self.forward_late(handle.await);

        TaskOutcome::new(TerminalState::Failed, None, Some(error), started_at)
    }

    fn finalize(
        &self,
        joined: std::result::Result<Result<Output>, JoinError>,
        started_at: chrono::DateTime<Utc>,
    ) -> TaskOutcome {
        let task_run = &self.shared.task_run;
        let cell = &self.shared.state;

        if let Some(existing) = cell.get() {
            // A kill claimed the state while the task was finishing
            self.forward_late(joined);
            return TaskOutcome::new(existing, None, None, started_at);
        }

        match joined {
            Ok(Ok(output)) => {
                let state = output.final_state().unwrap_or(TerminalState::Success);
                match cell.try_set(state) {
                    Ok(()) => TaskOutcome::new(state, Some(output), None, started_at),
                    Err(existing) => {
                        debug!(task_id = %task_run.task_id, state = %existing, "Task returned after kill");
                        TaskOutcome::new(existing, None, None, started_at)
                    }
                }
            }
            Ok(Err(e)) => self.fail(ExecutionError::TaskRaised(e), started_at),
            Err(join_error) if join_error.is_cancelled() => {
                // Only `kill` aborts, and it claims the cell before doing so
                let state = cell.settle(TerminalState::Killed);
                TaskOutcome::new(state, None, None, started_at)
            }
            Err(join_error) => {
                let message = panic_message(join_error);
                self.fail(ExecutionError::Panicked(message), started_at)
            }
        }
    }

    /// Whatever the task produced after its state was claimed by a stop.
    /// Output is dropped; errors still reach the exception handler.
    fn forward_late(&self, joined: std::result::Result<Result<Output>, JoinError>) {
        let task_run = &self.shared.task_run;
        match joined {
            Ok(Ok(_)) => debug!(task_id = %task_run.task_id, "Task returned after kill"),
            Ok(Err(e)) => self.handler.handle(task_run, &ExecutionError::TaskRaised(e)),
            Err(join_error) if join_error.is_cancelled() => {}
            Err(join_error) => {
                let message = panic_message(join_error);
                self.handler.handle(task_run, &ExecutionError::Panicked(message));
            }
        }
    }

    fn fail(&self, error: ExecutionError, started_at: chrono::DateTime<Utc>) -> TaskOutcome {
        self.handler.handle(&self.shared.task_run, &error);
        match self.shared.state.try_set(TerminalState::Failed) {
            Ok(()) => TaskOutcome::new(TerminalState::Failed, None, Some(error), started_at),
            Err(existing) => TaskOutcome::new(existing, None, None, started_at),
        }
    }
}

impl Drop for WorkerTaskUnit {
    fn drop(&mut self) {
        if let Some(handle) = self.shared.abort.lock().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for WorkerTaskUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerTaskUnit")
            .field("task_run", &self.shared.task_run)
            .field("deadline", &self.deadline)
            .field("state", &self.state())
            .finish()
    }
}

fn panic_message(join_error: JoinError) -> String {
    match join_error.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            }
        }
        Err(e) => e.to_string(),
    }
}
