//! Error types for Ralph
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// All error types that can occur in Ralph
#[derive(Debug, Error)]
pub enum RalphError {
    /// Configuration is missing required keys or violates an invariant
    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    /// Explicit resume of a checkpoint path that does not exist
    #[error("Checkpoint not found: {}", .0.display())]
    CheckpointNotFound(PathBuf),

    /// Checkpoint exists but cannot be deserialized
    #[error("Checkpoint corrupt: {0}")]
    CheckpointCorrupt(String),

    /// Another run holds the lock for this checkpoint path
    #[error("Checkpoint locked: {}", .0.display())]
    CheckpointLocked(PathBuf),

    /// Agent process could not be spawned or managed
    #[error("Agent error: {0}")]
    Agent(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Ralph operations
pub type Result<T> = std::result::Result<T, RalphError>;
