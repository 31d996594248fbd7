//! Durable checkpoint manager for challenge workflow state.
//!
//! Wraps a `CheckpointStore` with a write-through in-process cache. A state or
//! artifact enters the cache only after the store accepted it, so the
//! persisted copy is always at least as current as anything served from
//! memory, and a failed write leaves the last committed copy in place.

use dashmap::DashMap;
use skillpath_types::curriculum::CachedArtifact;
use skillpath_types::session::SessionKey;
use skillpath_types::workflow::WorkflowState;

use crate::repository::checkpoint::CheckpointStore;

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Manages durable checkpoints for challenge workflows.
///
/// Generic over `S: CheckpointStore` so it works with any storage backend
/// (SQLite, in-memory, etc.).
pub struct CheckpointManager<S: CheckpointStore> {
    store: S,
    states: DashMap<SessionKey, WorkflowState>,
    artifacts: DashMap<SessionKey, CachedArtifact>,
}

impl<S: CheckpointStore> CheckpointManager<S> {
    /// Create a new checkpoint manager backed by the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            states: DashMap::new(),
            artifacts: DashMap::new(),
        }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Workflow state
    // -----------------------------------------------------------------------

    /// Persist `state`, then refresh the cache.
    pub async fn save(&self, state: &WorkflowState) -> Result<(), CheckpointError> {
        self.store
            .save_state(state)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        self.states.insert(state.key, state.clone());

        tracing::debug!(
            session = %state.key,
            stage = %state.current_stage,
            attempt_count = state.attempt_count,
            "checkpointed workflow state"
        );
        Ok(())
    }

    /// Persist `state` only if its key has no state yet. Returns `true` when created.
    pub async fn create(&self, state: &WorkflowState) -> Result<bool, CheckpointError> {
        let created = self
            .store
            .create_state_if_absent(state)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        if created {
            self.states.insert(state.key, state.clone());
            tracing::debug!(session = %state.key, "checkpointed new workflow state");
        }
        Ok(created)
    }

    pub async fn find(&self, key: &SessionKey) -> Result<Option<WorkflowState>, CheckpointError> {
        if let Some(state) = self.states.get(key) {
            return Ok(Some(state.value().clone()));
        }
        let loaded = self
            .store
            .load_state(key)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        if let Some(state) = &loaded {
            self.states.insert(*key, state.clone());
        }
        Ok(loaded)
    }

    pub async fn load(&self, key: &SessionKey) -> Result<WorkflowState, CheckpointError> {
        self.find(key).await?.ok_or(CheckpointError::NotFound(*key))
    }

    /// States of one user, read from the store.
    pub async fn list(&self, user_id: i64) -> Result<Vec<WorkflowState>, CheckpointError> {
        self.store
            .list_states(user_id)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Cached artifact
    // -----------------------------------------------------------------------

    pub async fn save_artifact(
        &self,
        key: &SessionKey,
        artifact: &CachedArtifact,
    ) -> Result<(), CheckpointError> {
        self.store
            .save_artifact(key, artifact)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        self.artifacts.insert(*key, artifact.clone());

        tracing::debug!(session = %key, "cached challenge artifact");
        Ok(())
    }

    pub async fn load_artifact(
        &self,
        key: &SessionKey,
    ) -> Result<Option<CachedArtifact>, CheckpointError> {
        if let Some(artifact) = self.artifacts.get(key) {
            return Ok(Some(artifact.value().clone()));
        }
        let loaded = self
            .store
            .load_artifact(key)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        if let Some(artifact) = &loaded {
            self.artifacts.insert(*key, artifact.clone());
        }
        Ok(loaded)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying store operation failed.
    #[error("checkpoint repository error: {0}")]
    Repository(String),

    /// No checkpoint exists for the session.
    #[error("no checkpoint for session {0}")]
    NotFound(SessionKey),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryCheckpointStore;
    use crate::test_support::{FlakyCheckpointStore, sample_challenge, sample_seed};
    use chrono::Utc;
    use skillpath_types::curriculum::LessonContent;
    use skillpath_types::workflow::WorkflowStage;

    #[test]
    fn checkpoint_error_display() {
        let err = CheckpointError::Repository("disk full".to_string());
        assert!(err.to_string().contains("disk full"));

        let err = CheckpointError::NotFound(SessionKey::new(7, 2, 1));
        assert!(err.to_string().contains("user_7_m2_c1"));
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let manager = CheckpointManager::new(MemoryCheckpointStore::new());
        let err = manager.load(&SessionKey::new(1, 1, 1)).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_reads_through_to_store() {
        let store = MemoryCheckpointStore::new();
        let key = SessionKey::new(4, 1, 1);
        store
            .save_state(&WorkflowState::new(key, sample_seed()))
            .await
            .unwrap();

        let manager = CheckpointManager::new(store);
        let state = manager.load(&key).await.unwrap();
        assert_eq!(state.current_stage, WorkflowStage::PlanningResource);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_committed_copy() {
        let store = FlakyCheckpointStore::new();
        let manager = CheckpointManager::new(store.clone());
        let key = SessionKey::new(5, 1, 1);
        let mut state = WorkflowState::new(key, sample_seed());
        manager.save(&state).await.unwrap();

        store.fail_writes(true);
        state.transition(WorkflowStage::AuthoringLesson).unwrap();
        assert!(matches!(
            manager.save(&state).await,
            Err(CheckpointError::Repository(_))
        ));

        let loaded = manager.load(&key).await.unwrap();
        assert_eq!(loaded.current_stage, WorkflowStage::PlanningResource);
    }

    #[tokio::test]
    async fn test_artifact_cache_roundtrip() {
        let manager = CheckpointManager::new(MemoryCheckpointStore::new());
        let key = SessionKey::new(6, 1, 1);
        assert!(manager.load_artifact(&key).await.unwrap().is_none());

        let artifact = CachedArtifact {
            lesson: LessonContent {
                markdown: "# Vectors".to_string(),
            },
            challenge: sample_challenge(),
            created_at: Utc::now(),
        };
        manager.save_artifact(&key, &artifact).await.unwrap();
        assert_eq!(manager.load_artifact(&key).await.unwrap(), Some(artifact));
    }
}
