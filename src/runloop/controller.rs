//! Run loop controller - drives iterations until a terminal state.
//!
//! Each pass of the loop:
//! 1. Checks the stopping condition (terminal status, cancellation, max iterations)
//! 2. Invokes the agent with the current task context and timeout
//! 3. Classifies the result and appends an IterationRecord
//! 4. Applies the retry/backoff policy or advances the iteration index
//! 5. Persists RunState to the checkpoint store
//!
//! The checkpoint is written after every state transition; interrupting the
//! process at any point leaves a snapshot `resume` can pick up.

use crate::agent::{AgentResult, AgentRunner, AgentStatus, TaskContext, contains_marker};
use crate::cancel::CancelToken;
use crate::checkpoint::{CheckpointLock, CheckpointStore};
use crate::config::RunConfig;
use crate::domain::{IterationOutcome, IterationRecord, RunOutcome, RunState, RunStatus, summarize_output};
use crate::error::Result;
use crate::id::now_ms;

use super::backoff::BackoffPolicy;

/// Bytes of combined agent output kept per IterationRecord
const OUTPUT_SUMMARY_LIMIT: usize = 4096;

/// Drives a single run to a terminal state
pub struct RunLoopController<R: AgentRunner> {
    config: RunConfig,
    runner: R,
    cancel: CancelToken,
}

impl<R: AgentRunner> RunLoopController<R> {
    /// Create a controller, validating the config up front
    pub fn new(config: RunConfig, runner: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            runner,
            cancel: CancelToken::new(),
        })
    }

    /// Token external callers use to request cancellation
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Begin a new run, overwriting any previous checkpoint at the path
    pub async fn start(&self) -> Result<RunOutcome> {
        let _lock = CheckpointLock::acquire(&self.config.checkpoint_path)?;
        let state = RunState::new(self.config.task.clone());
        log::info!("starting run {} for task: {}", state.run_id, state.task);
        self.drive(state).await
    }

    /// Resume from the last checkpoint; behaves as `start` when none exists
    pub async fn resume(&self) -> Result<RunOutcome> {
        let _lock = CheckpointLock::acquire(&self.config.checkpoint_path)?;
        let store = CheckpointStore::new(&self.config.checkpoint_path);

        let state = if store.exists() {
            let state = store.load_state()?;
            log::info!(
                "resuming run {} at iteration {} ({} attempt(s) recorded)",
                state.run_id,
                state.iteration,
                state.history.len()
            );
            state
        } else {
            log::info!(
                "no checkpoint at {}, starting fresh",
                self.config.checkpoint_path.display()
            );
            RunState::new(self.config.task.clone())
        };

        if state.status.is_terminal() {
            return Ok(RunOutcome::from_state(&state));
        }
        self.drive(state).await
    }

    async fn drive(&self, mut state: RunState) -> Result<RunOutcome> {
        let store = CheckpointStore::new(&self.config.checkpoint_path);
        let backoff = BackoffPolicy::from_retry(&self.config.retry);

        // Persist the initial Running snapshot so even a run cancelled
        // before its first iteration is resumable.
        store.save(&state)?;

        while state.status == RunStatus::Running {
            if self.cancel.is_cancelled() {
                self.transition(&mut state, RunStatus::Aborted, &store)?;
                break;
            }

            if let Some(max) = self.config.max_iterations
                && state.iteration >= max
            {
                let last_success = state
                    .last_record()
                    .is_some_and(|r| r.outcome == IterationOutcome::Success);
                let status = if last_success { RunStatus::Succeeded } else { RunStatus::Failed };
                log::info!("max iterations ({}) reached, ending {:?}", max, status);
                self.transition(&mut state, status, &store)?;
                break;
            }

            let context = TaskContext::new(self.config.task.clone(), state.iteration);
            let started_at = now_ms();
            let result = self
                .runner
                .run(&context, self.config.timeout(), &self.cancel)
                .await?;
            let finished_at = now_ms();

            if result.status == AgentStatus::Cancelled {
                // In-flight invocation was killed; nothing completed to record
                self.transition(&mut state, RunStatus::Aborted, &store)?;
                break;
            }

            let outcome = classify(&result, self.config.fatal_exit_threshold);
            log::debug!(
                "iteration {} attempt {} finished: {:?} (exit {:?}, {:?})",
                state.iteration,
                state.consecutive_failures + 1,
                outcome,
                result.exit_code(),
                result.elapsed
            );

            state.record(IterationRecord {
                iteration: state.iteration,
                attempt: state.consecutive_failures + 1,
                started_at,
                finished_at,
                exit_status: result.exit_code(),
                output_summary: summarize_output(&result.stdout, &result.stderr, OUTPUT_SUMMARY_LIMIT),
                outcome,
            });

            match outcome {
                IterationOutcome::Success => {
                    state.consecutive_failures = 0;
                    let completed = contains_marker(&result.stdout, &self.config.completion_marker);
                    state.iteration += 1;
                    if completed {
                        log::info!("agent signaled completion at iteration {}", state.iteration - 1);
                        state.status = RunStatus::Succeeded;
                    }
                    state.touch();
                    store.save(&state)?;
                }
                IterationOutcome::RecoverableFailure | IterationOutcome::TimedOut => {
                    state.consecutive_failures += 1;
                    if state.consecutive_failures > self.config.retry.max_retries {
                        log::warn!(
                            "retries exhausted after {} attempt(s) at iteration {}",
                            state.consecutive_failures,
                            state.iteration
                        );
                        self.transition(&mut state, RunStatus::Failed, &store)?;
                    } else {
                        // Persist the retry before sleeping so a crash mid-backoff resumes here
                        state.touch();
                        store.save(&state)?;
                        let delay = backoff.delay(state.consecutive_failures);
                        log::info!(
                            "retrying iteration {} in {:?} (failure {}/{})",
                            state.iteration,
                            delay,
                            state.consecutive_failures,
                            self.config.retry.max_retries + 1
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = self.cancel.cancelled() => {
                                self.transition(&mut state, RunStatus::Aborted, &store)?;
                            }
                        }
                    }
                }
                IterationOutcome::FatalFailure => {
                    log::error!("fatal agent failure (exit {:?}), no retry", result.exit_code());
                    self.transition(&mut state, RunStatus::Failed, &store)?;
                }
            }
        }

        let outcome = RunOutcome::from_state(&state);
        log::info!("{}", outcome.summary);
        Ok(outcome)
    }

    fn transition(&self, state: &mut RunState, status: RunStatus, store: &CheckpointStore) -> Result<()> {
        state.status = status;
        state.touch();
        store.save(state)
    }
}

/// Map an agent result to an iteration outcome.
///
/// Cancellation is handled before classification and never reaches here in
/// the controller; a signal-killed child carries no exit code and stays
/// recoverable.
fn classify(result: &AgentResult, fatal_threshold: i32) -> IterationOutcome {
    match result.status {
        AgentStatus::Exited(0) => IterationOutcome::Success,
        AgentStatus::Exited(code) if code >= fatal_threshold => IterationOutcome::FatalFailure,
        AgentStatus::Exited(_) => IterationOutcome::RecoverableFailure,
        AgentStatus::Signaled => IterationOutcome::RecoverableFailure,
        AgentStatus::TimedOut => IterationOutcome::TimedOut,
        AgentStatus::Cancelled => IterationOutcome::RecoverableFailure,
    }
}
