//! Challenge workflow state machine.
//!
//! Drives one pipeline instance per session key:
//!
//! ```text
//! PLANNING_RESOURCE -> AUTHORING_LESSON -> AUTHORING_CHALLENGE -> AWAITING_SUBMISSION
//! AWAITING_SUBMISSION -> EVALUATING -> PASSED | REMEDIATING -> AWAITING_SUBMISSION
//! ```
//!
//! Every transition is checkpointed before the call that caused it returns.
//! `AWAITING_SUBMISSION` is the only state where the engine hands control back
//! to its caller; every other non-terminal state is engine-driven and can be
//! continued after a crash with [`ChallengeEngine::advance`].
//!
//! Stage calls go through the shared [`RetryController`]. When a stage gives
//! up, the persisted state stays at the last committed stage so a later call
//! repeats only the failed stage.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use skillpath_types::curriculum::{
    CachedArtifact, ChallengeSpec, HintLevel, LessonContent, SeedContext, Submission,
};
use skillpath_types::session::SessionKey;
use skillpath_types::stage::{StageId, StageOutput};
use skillpath_types::workflow::{
    SubmissionRecord, SubmissionResult, WorkflowStage, WorkflowState, WorkflowStatus,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::checkpoint::{CheckpointError, CheckpointManager};
use super::retry::{RetryController, RetryError};
use crate::repository::checkpoint::CheckpointStore;
use crate::stage::StageError;
use crate::stage::registry::StageRegistry;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How `start` treats a session key that already has a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Fail with `AlreadyStarted` if the session exists.
    Fresh,
    /// Continue an existing session, or start one if none exists.
    Resume,
}

/// The lesson and challenge a caller should present, with the session status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedChallenge {
    pub key: SessionKey,
    pub lesson: LessonContent,
    pub challenge: ChallengeSpec,
    /// `true` when served from the cached artifact without running any stage.
    pub cached: bool,
    pub status: WorkflowStatus,
}

impl PreparedChallenge {
    fn from_artifact(artifact: CachedArtifact, status: WorkflowStatus, cached: bool) -> Self {
        Self {
            key: status.key,
            lesson: artifact.lesson,
            challenge: artifact.challenge,
            cached,
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// ChallengeEngine
// ---------------------------------------------------------------------------

/// The challenge workflow state machine.
///
/// Instances for different session keys are independent and may run
/// concurrently. Calls for the same key are serialized by a per-key lock.
pub struct ChallengeEngine<S: CheckpointStore> {
    checkpoints: CheckpointManager<S>,
    stages: Arc<StageRegistry>,
    retry: RetryController,
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
    cancel: CancellationToken,
}

impl<S: CheckpointStore> ChallengeEngine<S> {
    pub fn new(store: S, stages: Arc<StageRegistry>, retry: RetryController) -> Self {
        Self {
            checkpoints: CheckpointManager::new(store),
            stages,
            retry,
            locks: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to stop pending retries (e.g. on shutdown).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn checkpoints(&self) -> &CheckpointManager<S> {
        &self.checkpoints
    }

    pub fn stages(&self) -> &Arc<StageRegistry> {
        &self.stages
    }

    async fn lock_session(&self, key: &SessionKey) -> SessionGuard<'_> {
        let lock = self.locks.entry(*key).or_default().clone();
        let guard = lock.lock_owned().await;
        SessionGuard {
            locks: &self.locks,
            key: *key,
            guard: Some(guard),
        }
    }

    // -----------------------------------------------------------------------
    // Caller operations
    // -----------------------------------------------------------------------

    /// Create the session and run it to the interrupt point.
    ///
    /// Safe to call concurrently for the same key: exactly one caller creates
    /// the session, the others observe `AlreadyStarted` (or resume it, with
    /// [`StartMode::Resume`]).
    pub async fn start(
        &self,
        key: SessionKey,
        seed: SeedContext,
        mode: StartMode,
    ) -> Result<PreparedChallenge, EngineError> {
        let _guard = self.lock_session(&key).await;

        if let Some(state) = self.checkpoints.find(&key).await? {
            return match mode {
                StartMode::Fresh => Err(EngineError::AlreadyStarted(key)),
                StartMode::Resume => self.prepare(state).await,
            };
        }
        self.create_and_prepare(key, seed, mode).await
    }

    /// Return the cached lesson and challenge, preparing them on first use.
    ///
    /// Once the artifact exists this never invokes a stage.
    pub async fn get_or_create_challenge(
        &self,
        key: SessionKey,
        seed: SeedContext,
    ) -> Result<PreparedChallenge, EngineError> {
        let _guard = self.lock_session(&key).await;

        match self.checkpoints.find(&key).await? {
            Some(state) => self.prepare(state).await,
            None => self.create_and_prepare(key, seed, StartMode::Resume).await,
        }
    }

    /// The cached challenge for `key`, if the session has one. Never runs a stage.
    pub async fn cached_challenge(
        &self,
        key: &SessionKey,
    ) -> Result<Option<PreparedChallenge>, EngineError> {
        let Some(artifact) = self.checkpoints.load_artifact(key).await? else {
            return Ok(None);
        };
        let state = self.checkpoints.load(key).await?;
        Ok(Some(PreparedChallenge::from_artifact(
            artifact,
            state.status(),
            true,
        )))
    }

    /// Evaluate a submission and, when it fails, produce the next hint.
    ///
    /// Only valid at `AWAITING_SUBMISSION`. Blocks until evaluation (and
    /// remediation, on failure) complete.
    pub async fn submit(
        &self,
        key: SessionKey,
        submission: Submission,
    ) -> Result<SubmissionResult, EngineError> {
        let _guard = self.lock_session(&key).await;

        let mut state = self.checkpoints.load(&key).await?;
        if state.current_stage != WorkflowStage::AwaitingSubmission {
            return Err(EngineError::InvalidState {
                key,
                stage: state.current_stage,
                operation: "submit",
            });
        }

        state.last_submission = Some(submission);
        self.commit(&mut state, WorkflowStage::Evaluating).await?;
        self.drive(&mut state).await?;

        state.last_result.clone().ok_or(EngineError::InvalidState {
            key,
            stage: state.current_stage,
            operation: "submit",
        })
    }

    /// Current persisted state. Never runs a stage.
    pub async fn resume(&self, key: SessionKey) -> Result<WorkflowState, EngineError> {
        Ok(self.checkpoints.load(&key).await?)
    }

    pub async fn status(&self, key: SessionKey) -> Result<WorkflowStatus, EngineError> {
        Ok(self.checkpoints.load(&key).await?.status())
    }

    /// Continue an engine-driven state left behind by a failure or crash.
    ///
    /// Runs pending authoring stages, an interrupted evaluation (using the
    /// persisted submission) or a pending remediation, and stops at the
    /// interrupt point or `PASSED`. A no-op for sessions already there.
    pub async fn advance(&self, key: SessionKey) -> Result<WorkflowStatus, EngineError> {
        let _guard = self.lock_session(&key).await;

        let mut state = self.checkpoints.load(&key).await?;
        let from = state.current_stage;
        self.drive(&mut state).await?;
        if state.challenge().is_some() {
            self.ensure_artifact(&state).await?;
        }

        if from != state.current_stage {
            tracing::info!(session = %key, from = %from, to = %state.current_stage, "advanced workflow");
        }
        Ok(state.status())
    }

    /// Status of every session of a user, ordered by module then challenge.
    pub async fn list_sessions(&self, user_id: i64) -> Result<Vec<WorkflowStatus>, EngineError> {
        Ok(self
            .checkpoints
            .list(user_id)
            .await?
            .iter()
            .map(WorkflowState::status)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Driving
    // -----------------------------------------------------------------------

    async fn create_and_prepare(
        &self,
        key: SessionKey,
        seed: SeedContext,
        mode: StartMode,
    ) -> Result<PreparedChallenge, EngineError> {
        let state = WorkflowState::new(key, seed);
        if !self.checkpoints.create(&state).await? {
            // Another process created it between our read and write.
            let existing = self.checkpoints.load(&key).await?;
            return match mode {
                StartMode::Fresh => Err(EngineError::AlreadyStarted(key)),
                StartMode::Resume => self.prepare(existing).await,
            };
        }
        tracing::info!(session = %key, "started challenge workflow");
        self.prepare(state).await
    }

    /// Serve the cached artifact or run the authoring stages to produce it.
    async fn prepare(&self, mut state: WorkflowState) -> Result<PreparedChallenge, EngineError> {
        if let Some(artifact) = self.checkpoints.load_artifact(&state.key).await? {
            return Ok(PreparedChallenge::from_artifact(
                artifact,
                state.status(),
                true,
            ));
        }

        while state.current_stage.is_authoring() {
            self.step(&mut state).await?;
        }
        let artifact = self.ensure_artifact(&state).await?;
        Ok(PreparedChallenge::from_artifact(
            artifact,
            state.status(),
            false,
        ))
    }

    /// Store the artifact from the state's context unless it already exists.
    async fn ensure_artifact(&self, state: &WorkflowState) -> Result<CachedArtifact, EngineError> {
        if let Some(artifact) = self.checkpoints.load_artifact(&state.key).await? {
            return Ok(artifact);
        }
        let artifact = CachedArtifact {
            lesson: self.required(state, StageId::LessonAuthoring, |s| s.lesson().cloned())?,
            challenge: self.required(state, StageId::ChallengeAuthoring, |s| {
                s.challenge().cloned()
            })?,
            created_at: Utc::now(),
        };
        self.checkpoints.save_artifact(&state.key, &artifact).await?;
        Ok(artifact)
    }

    /// Step until no engine-driven work is left.
    async fn drive(&self, state: &mut WorkflowState) -> Result<(), EngineError> {
        while state.current_stage.stage_id().is_some() {
            self.step(state).await?;
        }
        Ok(())
    }

    /// Run the stage owned by the current state and commit the transition.
    async fn step(&self, state: &mut WorkflowState) -> Result<(), EngineError> {
        let key = state.key;
        match state.current_stage {
            WorkflowStage::PlanningResource => {
                let seed = &state.seed;
                let resources = self
                    .call(key, StageId::ResourceLookup, || {
                        self.stages.produce_resource_context(seed)
                    })
                    .await?;
                state.record_output(StageOutput::ResourceLookup(resources));
                self.commit(state, WorkflowStage::AuthoringLesson).await
            }

            WorkflowStage::AuthoringLesson => {
                let resources =
                    self.required(state, StageId::ResourceLookup, |s| s.resources().cloned())?;
                let seed = &state.seed;
                let lesson = self
                    .call(key, StageId::LessonAuthoring, || {
                        self.stages.author_lesson(seed, &resources)
                    })
                    .await?;
                state.record_output(StageOutput::LessonAuthoring(lesson));
                self.commit(state, WorkflowStage::AuthoringChallenge).await
            }

            WorkflowStage::AuthoringChallenge => {
                let lesson =
                    self.required(state, StageId::LessonAuthoring, |s| s.lesson().cloned())?;
                let seed = &state.seed;
                let challenge = self
                    .call(key, StageId::ChallengeAuthoring, || {
                        self.stages.author_challenge(seed, &lesson)
                    })
                    .await?;
                state.record_output(StageOutput::ChallengeAuthoring(challenge));
                self.commit(state, WorkflowStage::AwaitingSubmission).await
            }

            WorkflowStage::Evaluating => self.evaluate(state).await,

            WorkflowStage::Remediating => self.remediate(state).await,

            WorkflowStage::AwaitingSubmission | WorkflowStage::Passed => Ok(()),
        }
    }

    async fn evaluate(&self, state: &mut WorkflowState) -> Result<(), EngineError> {
        let key = state.key;
        let Some(submission) = state.last_submission.clone() else {
            return Err(EngineError::InvalidState {
                key,
                stage: state.current_stage,
                operation: "evaluate",
            });
        };
        let challenge =
            self.required(state, StageId::ChallengeAuthoring, |s| s.challenge().cloned())?;

        let seed = &state.seed;
        let evaluated = self
            .call(key, StageId::Evaluation, || {
                self.stages
                    .evaluate_submission(seed, &challenge, &submission)
            })
            .await;
        let outcome = match evaluated {
            Ok(outcome) => outcome,
            Err(err) => {
                self.rollback_evaluation(state).await;
                return Err(err);
            }
        };

        state.attempt_count += 1;
        state.last_submission = None;
        state.submission_history.push(SubmissionRecord {
            id: Uuid::now_v7(),
            attempt: state.attempt_count,
            submission,
            outcome: outcome.clone(),
            evaluated_at: Utc::now(),
        });
        state.last_result = Some(SubmissionResult {
            outcome: outcome.clone(),
            hint: None,
            attempt_count: state.attempt_count,
        });
        let passed = outcome.passed;
        state.record_output(StageOutput::Evaluation(outcome));

        if passed {
            self.commit(state, WorkflowStage::Passed).await?;
            tracing::info!(session = %key, attempts = state.attempt_count, "challenge passed");
            Ok(())
        } else {
            state.hint_level = Some(HintLevel::for_attempts(state.attempt_count));
            self.commit(state, WorkflowStage::Remediating).await
        }
    }

    async fn remediate(&self, state: &mut WorkflowState) -> Result<(), EngineError> {
        let key = state.key;
        let Some(outcome) = state.last_result.as_ref().map(|r| r.outcome.clone()) else {
            return Err(EngineError::InvalidState {
                key,
                stage: state.current_stage,
                operation: "remediate",
            });
        };
        let Some(submission) = state
            .submission_history
            .last()
            .map(|record| record.submission.clone())
        else {
            return Err(EngineError::InvalidState {
                key,
                stage: state.current_stage,
                operation: "remediate",
            });
        };
        let challenge =
            self.required(state, StageId::ChallengeAuthoring, |s| s.challenge().cloned())?;
        let hint_level = state
            .hint_level
            .unwrap_or_else(|| HintLevel::for_attempts(state.attempt_count));

        let seed = &state.seed;
        let hint = self
            .call(key, StageId::Remediation, || {
                self.stages
                    .produce_remediation(seed, &challenge, &submission, &outcome, hint_level)
            })
            .await?;

        state.record_output(StageOutput::Remediation(hint.clone()));
        if let Some(result) = state.last_result.as_mut() {
            result.hint = Some(hint);
        }
        self.commit(state, WorkflowStage::AwaitingSubmission).await
    }

    /// Put a failed evaluation back to `AWAITING_SUBMISSION` so the learner
    /// can resubmit. The submission is dropped, `attempt_count` is untouched.
    async fn rollback_evaluation(&self, state: &mut WorkflowState) {
        state.current_stage = WorkflowStage::AwaitingSubmission;
        state.last_submission = None;
        state.updated_at = Utc::now();
        if let Err(e) = self.checkpoints.save(state).await {
            // The EVALUATING checkpoint stays; `advance` can still finish it.
            tracing::warn!(session = %state.key, error = %e, "failed to roll back evaluation");
        }
    }

    /// Apply `next` and persist it. Nothing is reported as done until the
    /// checkpoint write succeeded.
    async fn commit(&self, state: &mut WorkflowState, next: WorkflowStage) -> Result<(), EngineError> {
        let from = state.current_stage;
        state
            .transition(next)
            .map_err(|t| EngineError::InvalidState {
                key: state.key,
                stage: t.from,
                operation: "transition",
            })?;
        self.checkpoints.save(state).await?;

        tracing::debug!(session = %state.key, from = %from, to = %next, "workflow transition");
        Ok(())
    }

    async fn call<T, F, Fut>(&self, key: SessionKey, stage: StageId, call: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        self.retry
            .invoke(stage, &self.cancel, call)
            .await
            .map_err(|e| {
                tracing::warn!(session = %key, stage = %stage, error = %e, "stage call gave up");
                EngineError::from(e)
            })
    }

    fn required<T>(
        &self,
        state: &WorkflowState,
        stage: StageId,
        get: impl FnOnce(&WorkflowState) -> Option<T>,
    ) -> Result<T, EngineError> {
        get(state).ok_or_else(|| EngineError::ContractViolation {
            stage,
            detail: format!("session {} has no {stage} output recorded", state.key),
        })
    }
}

/// Holds a session's lock. On drop, the map entry is removed once no other
/// caller holds or waits on it.
struct SessionGuard<'a> {
    locks: &'a DashMap<SessionKey, Arc<Mutex<()>>>,
    key: SessionKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced by the challenge engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Operation not valid for the session's current stage. Not retried.
    #[error("cannot {operation} session {key} in stage {stage}")]
    InvalidState {
        key: SessionKey,
        stage: WorkflowStage,
        operation: &'static str,
    },

    #[error("session {0} already started")]
    AlreadyStarted(SessionKey),

    /// Retries ran out. The session is unchanged and can be retried later.
    #[error("stage {stage} gave up after {attempts} attempts: {cause}")]
    StageExhausted {
        stage: StageId,
        attempts: u32,
        #[source]
        cause: StageError,
    },

    /// The stage failed in a way retrying will not fix. The session is unchanged.
    #[error("stage {stage} failed: {cause}")]
    StageFailed {
        stage: StageId,
        #[source]
        cause: StageError,
    },

    #[error("stage {stage} broke its contract: {detail}")]
    ContractViolation { stage: StageId, detail: String },

    #[error("stage {stage} cancelled")]
    Cancelled { stage: StageId },

    #[error("session {0} not found")]
    NotFound(SessionKey),

    /// Checkpoint persistence failed; the transition did not happen.
    #[error("checkpoint I/O error: {0}")]
    Io(String),
}

impl EngineError {
    /// Whether a caller should present this as "try again shortly".
    pub fn is_retryable_later(&self) -> bool {
        matches!(
            self,
            EngineError::StageExhausted { .. } | EngineError::Io(_) | EngineError::Cancelled { .. }
        )
    }
}

impl From<CheckpointError> for EngineError {
    fn from(err: CheckpointError) -> Self {
        match err {
            CheckpointError::NotFound(key) => EngineError::NotFound(key),
            CheckpointError::Repository(msg) => EngineError::Io(msg),
        }
    }
}

impl From<RetryError> for EngineError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Exhausted {
                stage,
                attempts,
                last,
            } => EngineError::StageExhausted {
                stage,
                attempts,
                cause: last,
            },
            RetryError::Fatal {
                stage,
                error: StageError::Contract(detail),
            } => EngineError::ContractViolation { stage, detail },
            RetryError::Fatal { stage, error } => EngineError::StageFailed {
                stage,
                cause: error,
            },
            RetryError::Cancelled { stage, .. } => EngineError::Cancelled { stage },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
