//! `shell` - runs a command on the host
//!
//! Stopping is graceful first: `kill` sends SIGTERM and waits up to the
//! grace period for the process to exit. The unit then aborts `run`, which
//! drops the child and SIGKILLs whatever is left (`kill_on_drop`).

use crate::context::RunContext;
use crate::deadline::Deadline;
use crate::definition::TaskDefinition;
use crate::state::TerminalState;
use crate::task::{Output, RunnableTask};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use warden_foundation::{Error, Result, ShellSettings};

pub struct ShellTask {
    command: String,
    env: HashMap<String, String>,
    allow_failure: bool,
    interpreter: Option<String>,
    grace_period: Duration,
    timeout: Option<Deadline>,

    pid: Mutex<Option<u32>>,
    running: AtomicBool,
    exited: Notify,
}

impl ShellTask {
    pub fn new(command: impl Into<String>, settings: &ShellSettings) -> Self {
        Self {
            command: command.into(),
            env: HashMap::new(),
            allow_failure: false,
            interpreter: settings.interpreter.clone(),
            grace_period: settings.grace_period(),
            timeout: None,
            pid: Mutex::new(None),
            running: AtomicBool::new(false),
            exited: Notify::new(),
        }
    }

    /// Properties: `command` (required), `env`, `allowFailure`
    pub fn from_definition(def: &TaskDefinition, settings: &ShellSettings) -> Result<Self> {
        let mut task = Self::new(def.required::<String>("command")?, settings);
        task.env = def.property("env")?.unwrap_or_default();
        task.allow_failure = def.property("allowFailure")?.unwrap_or(false);
        task.timeout = def.timeout()?;
        Ok(task)
    }

    pub fn allow_failure(mut self, allow: bool) -> Self {
        self.allow_failure = allow;
        self
    }

    fn shell(&self) -> (&str, &'static str) {
        let arg = if cfg!(windows) { "/C" } else { "-c" };
        match &self.interpreter {
            Some(interpreter) => (interpreter.as_str(), arg),
            None if cfg!(windows) => ("cmd", arg),
            None => ("sh", arg),
        }
    }

    fn mark_exited(&self) {
        *self.pid.lock() = None;
        self.running.store(false, Ordering::SeqCst);
        self.exited.notify_waiters();
    }
}

#[async_trait]
impl RunnableTask for ShellTask {
    fn task_type(&self) -> &str {
        "shell"
    }

    fn timeout(&self) -> Option<Deadline> {
        self.timeout
    }

    async fn run(&self, _context: &RunContext) -> Result<Output> {
        let (shell, shell_arg) = self.shell();

        let mut cmd = Command::new(shell);
        cmd.arg(shell_arg)
            .arg(&self.command)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %self.command, "spawning process");

        let child = cmd
            .spawn()
            .map_err(|e| Error::Task(format!("Failed to spawn process: {}", e)))?;

        *self.pid.lock() = child.id();
        self.running.store(true, Ordering::SeqCst);

        let waited = child.wait_with_output().await;
        self.mark_exited();
        let output = waited.map_err(|e| Error::Task(format!("Process error: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        for line in stdout.lines() {
            info!("{}", line);
        }
        for line in stderr.lines() {
            warn!("{}", line);
        }

        let exit_code = output.status.code().unwrap_or(-1);
        let result = Output::new()
            .with("exitCode", exit_code)
            .with("stdout", stdout)
            .with("stderr", stderr.clone());

        if exit_code == 0 {
            return Ok(result);
        }

        if self.allow_failure {
            warn!(exit_code, "command failed, allowed by configuration");
            return Ok(result.with_final_state(TerminalState::Failed));
        }

        let detail = stderr.lines().last().unwrap_or("no stderr");
        Err(Error::task_failed(
            "shell",
            format!("command exited with code {}: {}", exit_code, detail),
        ))
    }

    async fn kill(&self) -> Result<()> {
        let exited = self.exited.notified();
        tokio::pin!(exited);
        exited.as_mut().enable();

        let pid = *self.pid.lock();
        let Some(pid) = pid else {
            return Ok(());
        };
        if !self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        send_sigterm(pid)?;
        debug!(pid, grace_period = ?self.grace_period, "termination signal sent");

        if tokio::time::timeout(self.grace_period, exited).await.is_err() {
            warn!(pid, "process still running after grace period");
        }
        Ok(())
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> Result<()> {
    // SAFETY: plain syscall on a pid we spawned
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        return Err(Error::Task(format!(
            "Failed to send SIGTERM: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> Result<()> {
    debug!("no termination signal on this platform, relying on forced stop");
    Ok(())
}
