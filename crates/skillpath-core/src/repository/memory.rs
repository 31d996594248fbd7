//! In-memory repository implementations.
//!
//! Process-local stores backed by `DashMap`. Used by tests and by callers that
//! want an engine without durable storage.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use skillpath_types::curriculum::{CachedArtifact, ChallengeRoadmap, LearningPlan};
use skillpath_types::error::RepositoryError;
use skillpath_types::session::SessionKey;
use skillpath_types::workflow::WorkflowState;

use super::checkpoint::CheckpointStore;
use super::curriculum::CurriculumStore;

// ---------------------------------------------------------------------------
// MemoryCheckpointStore
// ---------------------------------------------------------------------------

/// Checkpoint store holding states and artifacts in memory.
///
/// Clones share the same maps, so a clone handed to a second engine behaves
/// like a restarted process reading the same database.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    states: Arc<DashMap<SessionKey, WorkflowState>>,
    artifacts: Arc<DashMap<SessionKey, CachedArtifact>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn save_state(&self, state: &WorkflowState) -> Result<(), RepositoryError> {
        self.states.insert(state.key, state.clone());
        Ok(())
    }

    async fn create_state_if_absent(&self, state: &WorkflowState) -> Result<bool, RepositoryError> {
        match self.states.entry(state.key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(state.clone());
                Ok(true)
            }
        }
    }

    async fn load_state(&self, key: &SessionKey) -> Result<Option<WorkflowState>, RepositoryError> {
        Ok(self.states.get(key).map(|s| s.value().clone()))
    }

    async fn list_states(&self, user_id: i64) -> Result<Vec<WorkflowState>, RepositoryError> {
        let mut states: Vec<WorkflowState> = self
            .states
            .iter()
            .filter(|entry| entry.key().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        states.sort_by_key(|s| s.key);
        Ok(states)
    }

    async fn save_artifact(
        &self,
        key: &SessionKey,
        artifact: &CachedArtifact,
    ) -> Result<(), RepositoryError> {
        self.artifacts.insert(*key, artifact.clone());
        Ok(())
    }

    async fn load_artifact(&self, key: &SessionKey) -> Result<Option<CachedArtifact>, RepositoryError> {
        Ok(self.artifacts.get(key).map(|a| a.value().clone()))
    }
}

// ---------------------------------------------------------------------------
// MemoryCurriculumStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryCurriculumStore {
    plans: Arc<DashMap<i64, LearningPlan>>,
    roadmaps: Arc<DashMap<(i64, u32), ChallengeRoadmap>>,
}

impl MemoryCurriculumStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CurriculumStore for MemoryCurriculumStore {
    async fn save_plan(&self, user_id: i64, plan: &LearningPlan) -> Result<(), RepositoryError> {
        self.plans.insert(user_id, plan.clone());
        Ok(())
    }

    async fn load_plan(&self, user_id: i64) -> Result<Option<LearningPlan>, RepositoryError> {
        Ok(self.plans.get(&user_id).map(|p| p.value().clone()))
    }

    async fn save_roadmap(
        &self,
        user_id: i64,
        roadmap: &ChallengeRoadmap,
    ) -> Result<(), RepositoryError> {
        self.roadmaps
            .insert((user_id, roadmap.module_number), roadmap.clone());
        Ok(())
    }

    async fn load_roadmap(
        &self,
        user_id: i64,
        module_number: u32,
    ) -> Result<Option<ChallengeRoadmap>, RepositoryError> {
        Ok(self
            .roadmaps
            .get(&(user_id, module_number))
            .map(|r| r.value().clone()))
    }

    async fn list_roadmaps(&self, user_id: i64) -> Result<Vec<ChallengeRoadmap>, RepositoryError> {
        let mut roadmaps: Vec<ChallengeRoadmap> = self
            .roadmaps
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        roadmaps.sort_by_key(|r| r.module_number);
        Ok(roadmaps)
    }

    async fn delete_roadmaps(&self, user_id: i64) -> Result<u64, RepositoryError> {
        let before = self.roadmaps.len();
        self.roadmaps.retain(|(owner, _), _| *owner != user_id);
        Ok((before - self.roadmaps.len()) as u64)
    }
}
