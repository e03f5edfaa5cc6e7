//! Run configuration loaded from `ralph.yml`.
//!
//! The file format is kept backward-compatible across migrations: unknown
//! keys are ignored, optional keys fall back to documented defaults, and
//! missing required keys fail validation with `ConfigInvalid`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RalphError, Result};

/// Immutable per-run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Task description handed to the agent each iteration
    pub task: String,
    /// Upper bound on iterations; unbounded when absent
    pub max_iterations: Option<u32>,
    /// Per-iteration timeout in seconds
    pub timeout_seconds: f64,
    /// Marker the agent prints to signal task completion
    pub completion_marker: String,
    /// Exit codes at or above this value are fatal, below it recoverable
    pub fatal_exit_threshold: i32,
    /// Where run state is checkpointed between iterations
    pub checkpoint_path: PathBuf,
    pub agent: AgentConfig,
    pub retry: RetryConfig,
}

/// External worker invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Program to invoke once per iteration
    pub command: String,
    /// Arguments passed before the task context arrives on stdin
    pub args: Vec<String>,
}

/// Retry and backoff policy for recoverable failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base_seconds: f64,
    pub backoff_multiplier: f64,
    pub backoff_cap_seconds: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_seconds: 1.0,
            backoff_multiplier: 2.0,
            backoff_cap_seconds: 60.0,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            task: String::new(),
            max_iterations: None,
            timeout_seconds: 300.0,
            completion_marker: "LOOP_COMPLETE".to_string(),
            fatal_exit_threshold: 64,
            checkpoint_path: PathBuf::from(".ralph/checkpoint.json"),
            agent: AgentConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration with fallback chain
    ///
    /// An explicit path must exist and parse. Without one, `./ralph.yml` is
    /// tried before falling back to defaults (which fail `validate` until a
    /// task and agent command are supplied another way).
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let fallback_config = PathBuf::from("ralph.yml");
        if fallback_config.exists() {
            return Self::load_from_file(&fallback_config);
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| RalphError::ConfigInvalid(format!("cannot read {}: {}", path.display(), e)))?;

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| RalphError::ConfigInvalid(format!("cannot parse {}: {}", path.display(), e)))?;

        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Check the config invariants, reporting the first violation
    pub fn validate(&self) -> Result<()> {
        if self.task.trim().is_empty() {
            return Err(RalphError::ConfigInvalid("task must not be empty".to_string()));
        }
        if self.agent.command.trim().is_empty() {
            return Err(RalphError::ConfigInvalid("agent.command must not be empty".to_string()));
        }
        if let Some(max) = self.max_iterations
            && max == 0
        {
            return Err(RalphError::ConfigInvalid("max_iterations must be positive".to_string()));
        }
        if !self.timeout_seconds.is_finite() || self.timeout_seconds <= 0.0 {
            return Err(RalphError::ConfigInvalid("timeout_seconds must be positive".to_string()));
        }
        if self.fatal_exit_threshold <= 1 {
            return Err(RalphError::ConfigInvalid(
                "fatal_exit_threshold must be greater than 1".to_string(),
            ));
        }
        if !self.retry.backoff_base_seconds.is_finite() || self.retry.backoff_base_seconds <= 0.0 {
            return Err(RalphError::ConfigInvalid(
                "retry.backoff_base_seconds must be positive".to_string(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(RalphError::ConfigInvalid(
                "retry.backoff_multiplier must be at least 1".to_string(),
            ));
        }
        if !self.retry.backoff_cap_seconds.is_finite()
            || self.retry.backoff_cap_seconds < self.retry.backoff_base_seconds
        {
            return Err(RalphError::ConfigInvalid(
                "retry.backoff_cap_seconds must be at least backoff_base_seconds".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-iteration timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}
