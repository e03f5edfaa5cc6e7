//! Run outcome types.
//!
//! The terminal result of a run: final status, a human-readable summary,
//! and the full iteration history for post-mortem inspection.

use serde::{Deserialize, Serialize};

use super::run_state::{IterationRecord, RunState, RunStatus};

/// Outcome of a completed (terminal) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Iterations fully completed before the run ended
    pub iterations: u32,
    /// Human-readable one-line summary
    pub summary: String,
    /// Every recorded attempt, in execution order
    pub history: Vec<IterationRecord>,
}

impl RunOutcome {
    /// Build the outcome from terminal run state
    pub fn from_state(state: &RunState) -> Self {
        let attempts = state.history.len();
        let summary = match state.status {
            RunStatus::Succeeded => {
                format!("run {} succeeded after {} iteration(s)", state.run_id, state.iteration)
            }
            RunStatus::Failed => format!(
                "run {} failed at iteration {} after {} attempt(s)",
                state.run_id, state.iteration, attempts
            ),
            RunStatus::Aborted => {
                format!("run {} aborted at iteration {}", state.run_id, state.iteration)
            }
            RunStatus::Running => format!("run {} still running", state.run_id),
        };

        Self {
            status: state.status,
            iterations: state.iteration,
            summary,
            history: state.history.clone(),
        }
    }
}
