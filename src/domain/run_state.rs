//! Run state and iteration records
//!
//! RunState is owned exclusively by the run loop controller while a run is
//! active and is mirrored to the checkpoint store after every transition.
//! The history is append-only: records are pushed in execution order and
//! never reordered or rewritten.

use serde::{Deserialize, Serialize};

use crate::id::{generate_run_id, now_ms};

/// Cumulative status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Actively iterating
    Running,
    /// Agent signaled completion, or max iterations reached on a success
    Succeeded,
    /// Retries exhausted or fatal failure
    Failed,
    /// External cancellation observed
    Aborted,
}

impl RunStatus {
    /// Returns true if no further transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted)
    }
}

/// Classification of one agent invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationOutcome {
    /// Agent exited zero
    Success,
    /// Non-zero exit below the fatal threshold; subject to retry policy
    RecoverableFailure,
    /// Exit at or above the fatal threshold; terminal, no retry
    FatalFailure,
    /// Agent exceeded the per-iteration timeout and was killed
    TimedOut,
}

impl IterationOutcome {
    /// Returns true for outcomes the retry policy may recover from
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IterationOutcome::RecoverableFailure | IterationOutcome::TimedOut)
    }
}

/// One immutable record per completed iteration attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Iteration index; repeats across retry attempts, never decreases
    pub iteration: u32,
    /// Attempt number at this index (1-indexed)
    pub attempt: u32,
    pub started_at: i64,
    pub finished_at: i64,
    /// Exit code when the agent exited; None when killed
    pub exit_status: Option<i32>,
    /// Truncated combined output for post-mortem inspection
    pub output_summary: String,
    pub outcome: IterationOutcome,
}

/// Mutable run state, checkpointed after every transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Unique identifier for this run
    pub run_id: String,
    /// Task the run was started with
    pub task: String,
    /// Current iteration index (starts at 0, advances only on success)
    pub iteration: u32,
    pub status: RunStatus,
    /// Failures since the last success at the current iteration index
    pub consecutive_failures: u32,
    /// Append-only, insertion order = execution order
    pub history: Vec<IterationRecord>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RunState {
    /// Create fresh state for a new run
    pub fn new(task: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            run_id: generate_run_id(),
            task: task.into(),
            iteration: 0,
            status: RunStatus::Running,
            consecutive_failures: 0,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a completed attempt and update the timestamp
    pub fn record(&mut self, record: IterationRecord) {
        self.history.push(record);
        self.touch();
    }

    /// Last completed attempt, if any
    pub fn last_record(&self) -> Option<&IterationRecord> {
        self.history.last()
    }

    /// Total attempts at the given iteration index
    pub fn attempts_at(&self, iteration: u32) -> u32 {
        self.history.iter().filter(|r| r.iteration == iteration).count() as u32
    }

    /// Update the timestamp
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

/// Build a bounded summary of captured agent output.
///
/// Stderr is appended under a marker line when present; the result is
/// truncated to `limit` bytes on a char boundary.
pub fn summarize_output(stdout: &str, stderr: &str, limit: usize) -> String {
    let mut summary = stdout.trim_end().to_string();
    if !stderr.trim().is_empty() {
        if !summary.is_empty() {
            summary.push('\n');
        }
        summary.push_str("--- stderr ---\n");
        summary.push_str(stderr.trim_end());
    }

    if summary.len() <= limit {
        return summary;
    }

    let mut cut = limit;
    while cut > 0 && !summary.is_char_boundary(cut) {
        cut -= 1;
    }
    summary.truncate(cut);
    summary.push_str("\n... (truncated)");
    summary
}
