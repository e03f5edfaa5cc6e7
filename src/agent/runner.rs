//! Agent runner - invokes the external worker for one iteration.
//!
//! The subprocess is a scoped resource: on every exit path (natural exit,
//! timeout, cancellation, panic-drop) the child is terminated and reaped,
//! never orphaned.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use crate::cancel::CancelToken;
use crate::error::{RalphError, Result};

/// Context handed to the agent for one iteration
#[derive(Debug, Clone, PartialEq)]
pub struct TaskContext {
    /// Task description, written to the agent's stdin
    pub task: String,
    /// Current iteration index, exported as RALPH_ITERATION
    pub iteration: u32,
}

impl TaskContext {
    pub fn new(task: impl Into<String>, iteration: u32) -> Self {
        Self {
            task: task.into(),
            iteration,
        }
    }
}

/// How the agent invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Process exited on its own with this code
    Exited(i32),
    /// Process was killed by a signal (no exit code)
    Signaled,
    /// Process exceeded the timeout and was killed
    TimedOut,
    /// Cancellation was requested and the process was killed
    Cancelled,
}

/// Result of one agent invocation
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub status: AgentStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl AgentResult {
    /// Exit code, when the agent exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            AgentStatus::Exited(code) => Some(code),
            _ => None,
        }
    }
}

/// Seam for invoking the external worker once per iteration
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run the agent with the given context, bounded by `timeout`.
    ///
    /// Must guarantee the subprocess is not left running after the call
    /// returns, whether it finishes, times out, or is cancelled.
    async fn run(&self, context: &TaskContext, timeout: Duration, cancel: &CancelToken) -> Result<AgentResult>;
}

/// AgentRunner that spawns a configured command
pub struct CommandAgentRunner {
    command: String,
    args: Vec<String>,
}

impl CommandAgentRunner {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn spawn(&self, context: &TaskContext) -> Result<Child> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .env("RALPH_ITERATION", context.iteration.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop: reap the child even if this future is dropped
            .kill_on_drop(true);

        cmd.spawn()
            .map_err(|e| RalphError::Agent(format!("failed to spawn '{}': {}", self.command, e)))
    }
}

#[async_trait]
impl AgentRunner for CommandAgentRunner {
    async fn run(&self, context: &TaskContext, timeout: Duration, cancel: &CancelToken) -> Result<AgentResult> {
        let started = Instant::now();
        let mut child = self.spawn(context)?;

        // Feed the task context from a detached task so a child that never
        // reads stdin cannot stall the timeout below. Dropping the handle
        // closes the pipe; a child that exits early produces a broken pipe,
        // which is its business, not ours.
        if let Some(mut stdin) = child.stdin.take() {
            let payload = context.task.clone().into_bytes();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await
                    && e.kind() != std::io::ErrorKind::BrokenPipe
                {
                    log::warn!("failed to write task context to agent stdin: {}", e);
                }
            });
        }

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| RalphError::Agent("agent stdout not captured".to_string()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| RalphError::Agent("agent stderr not captured".to_string()))?;

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        let status = tokio::select! {
            exit = child.wait() => {
                let exit = exit.map_err(|e| RalphError::Agent(format!("failed to wait on agent: {}", e)))?;
                match exit.code() {
                    Some(code) => AgentStatus::Exited(code),
                    None => AgentStatus::Signaled,
                }
            }
            _ = tokio::time::sleep(timeout) => {
                log::warn!("agent exceeded timeout of {:?}, killing", timeout);
                kill_and_reap(&mut child).await;
                AgentStatus::TimedOut
            }
            _ = cancel.cancelled() => {
                log::info!("cancellation requested, killing agent");
                kill_and_reap(&mut child).await;
                AgentStatus::Cancelled
            }
        };

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        Ok(AgentResult {
            status,
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            elapsed: started.elapsed(),
        })
    }
}

/// Terminate the child and wait for it so no zombie remains
async fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        log::warn!("failed to kill agent process: {}", e);
    }
    let _ = child.wait().await;
}
