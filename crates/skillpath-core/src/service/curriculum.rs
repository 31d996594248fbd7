//! Curriculum service.
//!
//! The caller-facing use cases: approve a learning plan (generating and
//! storing every module roadmap), fetch or prepare a challenge by session key,
//! submit a solution, and query workflow status. A session key is all a
//! caller needs: the seed context for a new session is rebuilt from the
//! stored plan and roadmap.

use std::sync::Arc;

use skillpath_types::curriculum::{
    ChallengeBrief, ChallengeRoadmap, LearningPlan, SeedContext, Submission,
};
use skillpath_types::session::SessionKey;
use skillpath_types::workflow::{SubmissionResult, WorkflowStatus};

use crate::repository::checkpoint::CheckpointStore;
use crate::repository::curriculum::CurriculumStore;
use crate::workflow::batch::{BatchController, BatchError, BatchEvent, BatchSummary};
use crate::workflow::engine::{ChallengeEngine, EngineError, PreparedChallenge};

/// Service orchestrating plans, roadmaps and challenge sessions.
///
/// Generic over both storage ports -- skillpath-core never depends on
/// skillpath-infra.
pub struct CurriculumService<S: CheckpointStore, C: CurriculumStore> {
    engine: Arc<ChallengeEngine<S>>,
    batch: BatchController,
    curriculum: C,
}

impl<S: CheckpointStore, C: CurriculumStore> CurriculumService<S, C> {
    pub fn new(engine: Arc<ChallengeEngine<S>>, batch: BatchController, curriculum: C) -> Self {
        Self {
            engine,
            batch,
            curriculum,
        }
    }

    pub fn engine(&self) -> &Arc<ChallengeEngine<S>> {
        &self.engine
    }

    // -----------------------------------------------------------------------
    // Plans and roadmaps
    // -----------------------------------------------------------------------

    /// Store `plan` for the user and generate a roadmap per module.
    ///
    /// Replaces any previously approved plan together with its roadmaps.
    pub async fn generate_all_roadmaps(
        &self,
        user_id: i64,
        plan: &LearningPlan,
    ) -> Result<BatchSummary, ServiceError> {
        self.generate_all_roadmaps_with(user_id, plan, |_| {}).await
    }

    pub async fn generate_all_roadmaps_with(
        &self,
        user_id: i64,
        plan: &LearningPlan,
        on_event: impl FnMut(&BatchEvent),
    ) -> Result<BatchSummary, ServiceError> {
        if plan.learning_goal.trim().is_empty() {
            return Err(ServiceError::InvalidPlan("learning goal is empty".to_string()));
        }
        if plan.modules.is_empty() {
            return Err(ServiceError::InvalidPlan("plan has no modules".to_string()));
        }

        // Roadmaps of the previous plan go first so none survives under the new one.
        self.curriculum
            .delete_roadmaps(user_id)
            .await
            .map_err(|e| ServiceError::Repository(e.to_string()))?;
        self.curriculum
            .save_plan(user_id, plan)
            .await
            .map_err(|e| ServiceError::Repository(e.to_string()))?;

        let summary = self.batch.generate_all_with(plan, on_event).await?;
        for roadmap in &summary.roadmaps {
            self.curriculum
                .save_roadmap(user_id, roadmap)
                .await
                .map_err(|e| ServiceError::Repository(e.to_string()))?;
        }

        tracing::info!(
            user_id,
            modules = summary.total_modules,
            challenges = summary.total_challenges,
            failed = ?summary.failed_modules,
            "learning plan approved"
        );
        Ok(summary)
    }

    pub async fn plan(&self, user_id: i64) -> Result<LearningPlan, ServiceError> {
        self.curriculum
            .load_plan(user_id)
            .await
            .map_err(|e| ServiceError::Repository(e.to_string()))?
            .ok_or(ServiceError::PlanNotFound(user_id))
    }

    pub async fn roadmaps(&self, user_id: i64) -> Result<Vec<ChallengeRoadmap>, ServiceError> {
        self.curriculum
            .list_roadmaps(user_id)
            .await
            .map_err(|e| ServiceError::Repository(e.to_string()))
    }

    /// Rebuild the seed context of a session from the stored plan and roadmap.
    pub async fn seed_for(&self, key: &SessionKey) -> Result<SeedContext, ServiceError> {
        let plan = self.plan(key.user_id).await?;
        let module = plan
            .module(key.module_number)
            .ok_or(ServiceError::ModuleNotFound {
                user_id: key.user_id,
                module_number: key.module_number,
            })?;
        let roadmap = self
            .curriculum
            .load_roadmap(key.user_id, key.module_number)
            .await
            .map_err(|e| ServiceError::Repository(e.to_string()))?
            .ok_or(ServiceError::RoadmapNotFound {
                user_id: key.user_id,
                module_number: key.module_number,
            })?;
        let brief = roadmap
            .challenge(key.challenge_number)
            .cloned()
            .ok_or(ServiceError::ChallengeNotFound(*key))?;
        let (previous, upcoming): (Vec<ChallengeBrief>, Vec<ChallengeBrief>) = roadmap
            .challenges
            .into_iter()
            .filter(|c| c.challenge_number != key.challenge_number)
            .partition(|c| c.challenge_number < key.challenge_number);

        Ok(SeedContext {
            learning_goal: plan.learning_goal.clone(),
            experience_level: plan.experience_level,
            goal_type: plan.goal_type,
            module_title: module.title.clone(),
            module_topics: module.topics.clone(),
            challenge: brief,
            previous_challenges: previous,
            upcoming_challenges: upcoming,
        })
    }

    // -----------------------------------------------------------------------
    // Challenges
    // -----------------------------------------------------------------------

    /// Lesson and challenge for `key`, prepared on first use and cached after.
    pub async fn challenge(&self, key: SessionKey) -> Result<PreparedChallenge, ServiceError> {
        if let Some(prepared) = self.engine.cached_challenge(&key).await? {
            return Ok(prepared);
        }
        let seed = self.seed_for(&key).await?;
        Ok(self.engine.get_or_create_challenge(key, seed).await?)
    }

    pub async fn submit(
        &self,
        key: SessionKey,
        submission: Submission,
    ) -> Result<SubmissionResult, ServiceError> {
        if submission.is_blank() {
            return Err(ServiceError::EmptySubmission);
        }
        Ok(self.engine.submit(key, submission).await?)
    }

    pub async fn status(&self, key: SessionKey) -> Result<WorkflowStatus, ServiceError> {
        Ok(self.engine.status(key).await?)
    }

    pub async fn advance(&self, key: SessionKey) -> Result<WorkflowStatus, ServiceError> {
        Ok(self.engine.advance(key).await?)
    }

    pub async fn sessions(&self, user_id: i64) -> Result<Vec<WorkflowStatus>, ServiceError> {
        Ok(self.engine.list_sessions(user_id).await?)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("storage error: {0}")]
    Repository(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("no approved plan for user {0}")]
    PlanNotFound(i64),

    #[error("plan of user {user_id} has no module {module_number}")]
    ModuleNotFound { user_id: i64, module_number: u32 },

    #[error("no roadmap for user {user_id} module {module_number}")]
    RoadmapNotFound { user_id: i64, module_number: u32 },

    #[error("roadmap has no challenge for session {0}")]
    ChallengeNotFound(SessionKey),

    #[error("submission is empty")]
    EmptySubmission,
}

impl ServiceError {
    pub fn is_retryable_later(&self) -> bool {
        match self {
            ServiceError::Engine(e) => e.is_retryable_later(),
            ServiceError::Repository(_) => true,
            _ => false,
        }
    }
}
