//! Checkpoint store
//!
//! Persists run state keyed by run id so interrupted runs can resume from
//! the last settled barrier group. Snapshots are whole-state, not
//! incremental; the newest snapshot for a run wins.

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::state::WorkflowState;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend for run snapshots
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a snapshot, replacing any previous one for the same run.
    async fn save(&self, state: &WorkflowState) -> Result<(), CheckpointError>;

    /// Load the latest snapshot for a run, if one exists.
    async fn load(&self, run_id: Uuid) -> Result<Option<WorkflowState>, CheckpointError>;

    /// Drop the snapshot for a run. Deleting a missing snapshot is not an
    /// error.
    async fn delete(&self, run_id: Uuid) -> Result<(), CheckpointError>;
}

/// In-memory store for tests and checkpoint-less deployments
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    snapshots: DashMap<Uuid, WorkflowState>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, state: &WorkflowState) -> Result<(), CheckpointError> {
        self.snapshots.insert(state.run_id, state.clone());
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<WorkflowState>, CheckpointError> {
        Ok(self.snapshots.get(&run_id).map(|entry| entry.clone()))
    }

    async fn delete(&self, run_id: Uuid) -> Result<(), CheckpointError> {
        self.snapshots.remove(&run_id);
        Ok(())
    }
}

/// File-backed store: one pretty-printed JSON document per run under a
/// spool directory
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, run_id: Uuid) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, state: &WorkflowState) -> Result<(), CheckpointError> {
        let payload = serde_json::to_vec_pretty(state)?;
        let path = self.path_for(state.run_id);
        tokio::fs::write(&path, payload).await?;
        debug!(run_id = %state.run_id, path = %path.display(), "Checkpoint saved");
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<WorkflowState>, CheckpointError> {
        match tokio::fs::read(self.path_for(run_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, run_id: Uuid) -> Result<(), CheckpointError> {
        match tokio::fs::remove_file(self.path_for(run_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
