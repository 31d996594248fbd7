//! Scripted stage backend and fixtures for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use skillpath_types::curriculum::{
    CachedArtifact, ChallengeBrief, ChallengeFormat, ChallengeRoadmap, ChallengeSpec,
    EvaluationOutcome, ExperienceLevel, LearningGoalType, LearningPlan, LessonContent,
    ModuleDescriptor, RemediationHint, ResourceContext, SeedContext,
};
use skillpath_types::error::RepositoryError;
use skillpath_types::session::SessionKey;
use skillpath_types::stage::{StageId, StageInput, StageOutput};
use skillpath_types::workflow::WorkflowState;

use crate::repository::checkpoint::CheckpointStore;
use crate::repository::memory::MemoryCheckpointStore;
use crate::stage::StageError;
use crate::stage::box_handler::BoxStageHandler;
use crate::stage::handler::StageHandler;
use crate::stage::registry::StageRegistry;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub(crate) fn sample_seed() -> SeedContext {
    SeedContext {
        learning_goal: "Build retrieval-augmented apps".to_string(),
        experience_level: ExperienceLevel::Intermediate,
        goal_type: LearningGoalType::CodeFocused,
        module_title: "Embeddings".to_string(),
        module_topics: vec![],
        challenge: ChallengeBrief {
            challenge_number: 1,
            title: "Cosine similarity".to_string(),
            learning_objective: "Compare two embedding vectors".to_string(),
            description: "Implement cosine similarity without numpy".to_string(),
        },
        previous_challenges: vec![],
        upcoming_challenges: vec![],
    }
}

pub(crate) fn sample_challenge() -> ChallengeSpec {
    ChallengeSpec {
        format: ChallengeFormat::Code,
        prompt: "Write cosine_similarity(a, b)".to_string(),
        starter_code: Some("def cosine_similarity(a, b):\n    pass\n".to_string()),
        expected_approach: "dot product over norms".to_string(),
        success_criteria: vec!["handles zero vectors".to_string()],
        hints_bank: vec![
            "What is a dot product?".to_string(),
            "Divide by the product of the norms".to_string(),
            "sum(x*y) / (norm(a)*norm(b))".to_string(),
        ],
    }
}

pub(crate) fn sample_outcome(passed: bool, score: u8) -> EvaluationOutcome {
    EvaluationOutcome {
        passed,
        score,
        errors: if passed {
            vec![]
        } else {
            vec!["wrong result for orthogonal vectors".to_string()]
        },
        feedback: format!("scored {score}"),
        what_worked: vec![],
        what_needs_work: vec![],
    }
}

pub(crate) fn sample_plan(module_count: u32) -> LearningPlan {
    LearningPlan {
        learning_goal: "Build retrieval-augmented apps".to_string(),
        experience_level: ExperienceLevel::Intermediate,
        goal_type: LearningGoalType::Hybrid,
        modules: (1..=module_count)
            .map(|n| ModuleDescriptor {
                module_number: n,
                title: format!("Module {n}"),
                topics: vec![format!("topic {n}")],
                exercises: vec![],
            })
            .collect(),
    }
}

pub(crate) fn sample_roadmap(module_number: u32) -> ChallengeRoadmap {
    ChallengeRoadmap {
        module_number,
        module_title: format!("Module {module_number}"),
        challenges: vec![ChallengeBrief {
            challenge_number: 1,
            title: format!("Module {module_number} warm-up"),
            learning_objective: "objective 1".to_string(),
            description: String::new(),
        }],
        progression_notes: String::new(),
    }
}

// ---------------------------------------------------------------------------
// ScriptedStages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Output(StageOutput),
    Fail(StageError),
}

#[derive(Default)]
struct Inner {
    queued: Mutex<HashMap<StageId, VecDeque<Scripted>>>,
    always_fail: Mutex<HashMap<StageId, StageError>>,
    calls: Mutex<HashMap<StageId, usize>>,
    last_inputs: Mutex<HashMap<StageId, StageInput>>,
    latency: Mutex<Option<Duration>>,
}

/// Stage backend that answers from per-stage scripts and counts calls.
///
/// Queued responses are consumed first; after that each stage falls back to
/// a deterministic default derived from its input.
#[derive(Clone, Default)]
pub(crate) struct ScriptedStages {
    inner: Arc<Inner>,
}

impl ScriptedStages {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn registry(&self) -> StageRegistry {
        StageRegistry::with_backend(BoxStageHandler::new(self.clone()))
    }

    pub(crate) fn push_output(&self, stage: StageId, output: StageOutput) {
        self.enqueue(stage, Scripted::Output(output));
    }

    pub(crate) fn push_error(&self, stage: StageId, error: StageError) {
        self.enqueue(stage, Scripted::Fail(error));
    }

    pub(crate) fn push_evaluation(&self, passed: bool, score: u8) {
        self.push_output(
            StageId::Evaluation,
            StageOutput::Evaluation(sample_outcome(passed, score)),
        );
    }

    /// Make every call to `stage` fail with `error` until cleared.
    pub(crate) fn fail_always(&self, stage: StageId, error: StageError) {
        self.inner.always_fail.lock().unwrap().insert(stage, error);
    }

    pub(crate) fn clear_failures(&self) {
        self.inner.always_fail.lock().unwrap().clear();
    }

    pub(crate) fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock().unwrap() = Some(latency);
    }

    pub(crate) fn calls(&self, stage: StageId) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap()
            .get(&stage)
            .copied()
            .unwrap_or(0)
    }

    /// The most recent request sent to `stage`.
    pub(crate) fn last_input(&self, stage: StageId) -> Option<StageInput> {
        self.inner.last_inputs.lock().unwrap().get(&stage).cloned()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.inner.calls.lock().unwrap().values().sum()
    }

    fn enqueue(&self, stage: StageId, scripted: Scripted) {
        self.inner
            .queued
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .push_back(scripted);
    }

    fn next(&self, input: &StageInput) -> Result<StageOutput, StageError> {
        let stage = input.stage();
        *self.inner.calls.lock().unwrap().entry(stage).or_default() += 1;
        self.inner
            .last_inputs
            .lock()
            .unwrap()
            .insert(stage, input.clone());

        if let Some(err) = self.inner.always_fail.lock().unwrap().get(&stage) {
            return Err(err.clone());
        }
        let queued = self
            .inner
            .queued
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(|q| q.pop_front());
        match queued {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Fail(err)) => Err(err),
            None => Ok(default_output(input)),
        }
    }
}

impl StageHandler for ScriptedStages {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, input: StageInput) -> Result<StageOutput, StageError> {
        let result = self.next(&input);
        let latency = *self.inner.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

fn default_output(input: &StageInput) -> StageOutput {
    match input {
        StageInput::ResourceLookup(req) => StageOutput::ResourceLookup(ResourceContext {
            summary: format!("Resources for {}", req.seed.challenge.title),
            references: vec!["https://docs.example.org/embeddings".to_string()],
        }),
        StageInput::LessonAuthoring(req) => StageOutput::LessonAuthoring(LessonContent {
            markdown: format!("# {}\n\n{}", req.seed.challenge.title, req.resources.summary),
        }),
        StageInput::ChallengeAuthoring(_) => StageOutput::ChallengeAuthoring(sample_challenge()),
        StageInput::Evaluation(_) => StageOutput::Evaluation(sample_outcome(true, 100)),
        StageInput::Remediation(req) => StageOutput::Remediation(RemediationHint {
            hint_level: req.hint_level,
            targeted_hint: format!("Hint {} for the failing case", req.hint_level.get()),
            encouragement: "Close, keep going".to_string(),
            key_concept_reminder: None,
        }),
        StageInput::RoadmapPlanning(req) => StageOutput::RoadmapPlanning(ChallengeRoadmap {
            module_number: req.module.module_number,
            module_title: req.module.title.clone(),
            challenges: (1..=2)
                .map(|n| ChallengeBrief {
                    challenge_number: n,
                    title: format!("{} challenge {n}", req.module.title),
                    learning_objective: format!("objective {n}"),
                    description: String::new(),
                })
                .collect(),
            progression_notes: String::new(),
        }),
    }
}

// ---------------------------------------------------------------------------
// FlakyCheckpointStore
// ---------------------------------------------------------------------------

/// In-memory checkpoint store whose writes can be switched to fail.
#[derive(Clone, Default)]
pub(crate) struct FlakyCheckpointStore {
    inner: MemoryCheckpointStore,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyCheckpointStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Query("disk I/O error".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CheckpointStore for FlakyCheckpointStore {
    async fn save_state(&self, state: &WorkflowState) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.save_state(state).await
    }

    async fn create_state_if_absent(&self, state: &WorkflowState) -> Result<bool, RepositoryError> {
        self.check()?;
        self.inner.create_state_if_absent(state).await
    }

    async fn load_state(&self, key: &SessionKey) -> Result<Option<WorkflowState>, RepositoryError> {
        self.inner.load_state(key).await
    }

    async fn list_states(&self, user_id: i64) -> Result<Vec<WorkflowState>, RepositoryError> {
        self.inner.list_states(user_id).await
    }

    async fn save_artifact(
        &self,
        key: &SessionKey,
        artifact: &CachedArtifact,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.save_artifact(key, artifact).await
    }

    async fn load_artifact(&self, key: &SessionKey) -> Result<Option<CachedArtifact>, RepositoryError> {
        self.inner.load_artifact(key).await
    }
}
