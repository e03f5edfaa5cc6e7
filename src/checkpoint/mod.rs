//! Durable checkpointing of run state.
//!
//! The checkpoint is a single JSON document mirroring RunState. Saves are
//! atomic: the snapshot is written to a sibling temp file, synced, then
//! renamed over the target, so a crash mid-save never leaves a readable
//! half-written checkpoint. The checkpoint file is single-writer; a lock
//! file next to it rejects concurrent runs against the same path.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::RunState;
use crate::error::{RalphError, Result};

/// On-disk envelope around RunState
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub saved_at: DateTime<Utc>,
    pub state: RunState,
}

/// Save/load of RunState snapshots at a fixed path
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Atomically persist a snapshot, replacing any previous checkpoint
    pub fn save(&self, state: &RunState) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let checkpoint = Checkpoint {
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let json = serde_json::to_string_pretty(&checkpoint)?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        log::debug!(
            "checkpoint saved: {} (iteration {})",
            self.path.display(),
            state.iteration
        );
        Ok(())
    }

    /// Load the last persisted snapshot
    pub fn load(&self) -> Result<Checkpoint> {
        if !self.path.exists() {
            return Err(RalphError::CheckpointNotFound(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)
            .map_err(|e| RalphError::CheckpointCorrupt(e.to_string()))?;
        Ok(checkpoint)
    }

    /// Load only the run state from the last snapshot
    pub fn load_state(&self) -> Result<RunState> {
        Ok(self.load()?.state)
    }
}

/// Advisory single-writer lock for a checkpoint path.
///
/// Held for the duration of a run; released on drop. A second acquire on
/// the same path fails fast with `CheckpointLocked`.
#[derive(Debug)]
pub struct CheckpointLock {
    lock_path: PathBuf,
}

impl CheckpointLock {
    pub fn acquire(checkpoint_path: &Path) -> Result<Self> {
        let lock_path = lock_path_for(checkpoint_path);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(RalphError::CheckpointLocked(checkpoint_path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for CheckpointLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            log::warn!("failed to remove lock file {}: {}", self.lock_path.display(), e);
        }
    }
}

fn lock_path_for(checkpoint_path: &Path) -> PathBuf {
    let mut name = checkpoint_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    name.push_str(".lock");
    checkpoint_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IterationOutcome, IterationRecord, RunStatus};
    use tempfile::TempDir;

    fn sample_state() -> RunState {
        let mut state = RunState::new("checkpoint me");
        state.iteration = 2;
        state.consecutive_failures = 1;
        state.record(IterationRecord {
            iteration: 0,
            attempt: 1,
            started_at: 10,
            finished_at: 20,
            exit_status: Some(0),
            output_summary: "first".to_string(),
            outcome: IterationOutcome::Success,
        });
        state.record(IterationRecord {
            iteration: 1,
            attempt: 1,
            started_at: 30,
            finished_at: 40,
            exit_status: Some(1),
            output_summary: "second".to_string(),
            outcome: IterationOutcome::RecoverableFailure,
        });
        state
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("run.json"));

        let state = sample_state();
        store.save(&state).unwrap();

        let loaded = store.load_state().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("run.json"));
        store.save(&sample_state()).unwrap();

        let first = store.load_state().unwrap();
        let second = store.load_state().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("absent.json"));

        let err = store.load().unwrap_err();
        assert!(matches!(err, RalphError::CheckpointNotFound(_)));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.json");
        fs::write(&path, "{ not json").unwrap();

        let store = CheckpointStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, RalphError::CheckpointCorrupt(_)));
    }

    #[test]
    fn test_load_truncated_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.json");
        let store = CheckpointStore::new(&path);
        store.save(&sample_state()).unwrap();

        // Simulate a torn write from a non-atomic writer
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, &content[..content.len() / 2]).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, RalphError::CheckpointCorrupt(_)));
    }

    #[test]
    fn test_save_overwrites_previous() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("run.json"));

        let mut state = sample_state();
        store.save(&state).unwrap();

        state.iteration = 5;
        state.status = RunStatus::Succeeded;
        store.save(&state).unwrap();

        let loaded = store.load_state().unwrap();
        assert_eq!(loaded.iteration, 5);
        assert_eq!(loaded.status, RunStatus::Succeeded);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("nested/deep/run.json"));

        store.save(&sample_state()).unwrap();
        assert!(store.exists());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("run.json"));
        store.save(&sample_state()).unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["run.json".to_string()]);
    }

    #[test]
    fn test_lock_rejects_second_acquire() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.json");

        let _lock = CheckpointLock::acquire(&path).unwrap();
        let err = CheckpointLock::acquire(&path).unwrap_err();
        assert!(matches!(err, RalphError::CheckpointLocked(_)));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.json");

        {
            let _lock = CheckpointLock::acquire(&path).unwrap();
        }
        // Reacquire succeeds after the guard is dropped
        let _lock = CheckpointLock::acquire(&path).unwrap();
    }

    #[test]
    fn test_lock_path_next_to_checkpoint() {
        let path = Path::new("/tmp/ralph/run.json");
        assert_eq!(lock_path_for(path), PathBuf::from("/tmp/ralph/run.json.lock"));
    }
}
