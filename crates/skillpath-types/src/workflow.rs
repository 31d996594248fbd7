//! Challenge workflow state.
//!
//! `WorkflowState` is the durable snapshot of one challenge pipeline instance.
//! It is created on the first invocation of a session key, mutated only by the
//! engine's state machine and persisted after every transition.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::curriculum::{
    ChallengeSpec, EvaluationOutcome, HintLevel, LessonContent, RemediationHint, ResourceContext,
    SeedContext, Submission,
};
use crate::session::SessionKey;
use crate::stage::{StageId, StageOutput};

// ---------------------------------------------------------------------------
// WorkflowStage
// ---------------------------------------------------------------------------

/// Position of a workflow instance in the challenge pipeline.
///
/// ```text
/// PLANNING_RESOURCE -> AUTHORING_LESSON -> AUTHORING_CHALLENGE -> AWAITING_SUBMISSION
///     AWAITING_SUBMISSION -> EVALUATING -> PASSED | REMEDIATING
///     REMEDIATING -> AWAITING_SUBMISSION
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStage {
    PlanningResource,
    AuthoringLesson,
    AuthoringChallenge,
    AwaitingSubmission,
    Evaluating,
    Remediating,
    Passed,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::PlanningResource => "PLANNING_RESOURCE",
            WorkflowStage::AuthoringLesson => "AUTHORING_LESSON",
            WorkflowStage::AuthoringChallenge => "AUTHORING_CHALLENGE",
            WorkflowStage::AwaitingSubmission => "AWAITING_SUBMISSION",
            WorkflowStage::Evaluating => "EVALUATING",
            WorkflowStage::Remediating => "REMEDIATING",
            WorkflowStage::Passed => "PASSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Passed)
    }

    /// The only state from which the engine yields control to the caller.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, WorkflowStage::AwaitingSubmission)
    }

    /// States that produce the lesson and challenge before the first interrupt.
    pub fn is_authoring(&self) -> bool {
        matches!(
            self,
            WorkflowStage::PlanningResource
                | WorkflowStage::AuthoringLesson
                | WorkflowStage::AuthoringChallenge
        )
    }

    /// The external stage invoked while in this state, if any.
    pub fn stage_id(&self) -> Option<StageId> {
        match self {
            WorkflowStage::PlanningResource => Some(StageId::ResourceLookup),
            WorkflowStage::AuthoringLesson => Some(StageId::LessonAuthoring),
            WorkflowStage::AuthoringChallenge => Some(StageId::ChallengeAuthoring),
            WorkflowStage::Evaluating => Some(StageId::Evaluation),
            WorkflowStage::Remediating => Some(StageId::Remediation),
            WorkflowStage::AwaitingSubmission | WorkflowStage::Passed => None,
        }
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: WorkflowStage) -> bool {
        use WorkflowStage::*;
        matches!(
            (self, next),
            (PlanningResource, AuthoringLesson)
                | (AuthoringLesson, AuthoringChallenge)
                | (AuthoringChallenge, AwaitingSubmission)
                | (AwaitingSubmission, Evaluating)
                | (Evaluating, Passed)
                | (Evaluating, Remediating)
                | (Remediating, AwaitingSubmission)
        )
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLANNING_RESOURCE" => Ok(WorkflowStage::PlanningResource),
            "AUTHORING_LESSON" => Ok(WorkflowStage::AuthoringLesson),
            "AUTHORING_CHALLENGE" => Ok(WorkflowStage::AuthoringChallenge),
            "AWAITING_SUBMISSION" => Ok(WorkflowStage::AwaitingSubmission),
            "EVALUATING" => Ok(WorkflowStage::Evaluating),
            "REMEDIATING" => Ok(WorkflowStage::Remediating),
            "PASSED" => Ok(WorkflowStage::Passed),
            other => Err(format!("unknown workflow stage: '{other}'")),
        }
    }
}

/// Attempted move between two states that are not adjacent in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: WorkflowStage,
    pub to: WorkflowStage,
}

// ---------------------------------------------------------------------------
// Submission records
// ---------------------------------------------------------------------------

/// One evaluated submission, kept in the state's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub attempt: u32,
    pub submission: Submission,
    pub outcome: EvaluationOutcome,
    pub evaluated_at: DateTime<Utc>,
}

/// What a caller sees after a submission: the evaluation, the hint when it
/// failed, and the attempt count after this submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub outcome: EvaluationOutcome,
    #[serde(default)]
    pub hint: Option<RemediationHint>,
    pub attempt_count: u32,
}

impl SubmissionResult {
    /// A hint is present exactly when the evaluation failed.
    pub fn is_complete(&self) -> bool {
        self.outcome.passed == self.hint.is_none()
    }
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Durable snapshot of one challenge pipeline instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub key: SessionKey,
    pub seed: SeedContext,
    pub current_stage: WorkflowStage,
    /// Output of each stage that has run. Authoring entries are written once;
    /// evaluation and remediation entries hold the latest result.
    #[serde(default)]
    pub accumulated_context: BTreeMap<StageId, StageOutput>,
    /// Submissions evaluated so far. Never decreases.
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub hint_level: Option<HintLevel>,
    /// Submission being evaluated. Set while `EVALUATING`, cleared afterwards.
    #[serde(default)]
    pub last_submission: Option<Submission>,
    #[serde(default)]
    pub last_result: Option<SubmissionResult>,
    #[serde(default)]
    pub submission_history: Vec<SubmissionRecord>,
    #[serde(default)]
    pub terminal: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    /// Fresh state at `PLANNING_RESOURCE`.
    pub fn new(key: SessionKey, seed: SeedContext) -> Self {
        let now = Utc::now();
        Self {
            key,
            seed,
            current_stage: WorkflowStage::PlanningResource,
            accumulated_context: BTreeMap::new(),
            attempt_count: 0,
            hint_level: None,
            last_submission: None,
            last_result: None,
            submission_history: Vec::new(),
            terminal: false,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move to `next`, refusing illegal moves and any move out of a terminal state.
    pub fn transition(&mut self, next: WorkflowStage) -> Result<(), InvalidTransition> {
        if self.terminal || !self.current_stage.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.current_stage,
                to: next,
            });
        }
        let now = Utc::now();
        self.current_stage = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.terminal = true;
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Store a stage's output under its stage id.
    pub fn record_output(&mut self, output: StageOutput) {
        self.accumulated_context.insert(output.stage(), output);
        self.updated_at = Utc::now();
    }

    pub fn resources(&self) -> Option<&ResourceContext> {
        match self.accumulated_context.get(&StageId::ResourceLookup) {
            Some(StageOutput::ResourceLookup(r)) => Some(r),
            _ => None,
        }
    }

    pub fn lesson(&self) -> Option<&LessonContent> {
        match self.accumulated_context.get(&StageId::LessonAuthoring) {
            Some(StageOutput::LessonAuthoring(l)) => Some(l),
            _ => None,
        }
    }

    pub fn challenge(&self) -> Option<&ChallengeSpec> {
        match self.accumulated_context.get(&StageId::ChallengeAuthoring) {
            Some(StageOutput::ChallengeAuthoring(c)) => Some(c),
            _ => None,
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        WorkflowStatus {
            key: self.key,
            current_stage: self.current_stage,
            attempt_count: self.attempt_count,
            hint_level: self.hint_level,
            terminal: self.terminal,
            last_score: self.last_result.as_ref().map(|r| r.outcome.score),
            started_at: self.started_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        }
    }
}

/// Caller-facing summary of a workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub key: SessionKey,
    pub current_stage: WorkflowStage,
    pub attempt_count: u32,
    pub hint_level: Option<HintLevel>,
    pub terminal: bool,
    pub last_score: Option<u8>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::{ChallengeBrief, ExperienceLevel, LearningGoalType};

    fn seed() -> SeedContext {
        SeedContext {
            learning_goal: "Build agents with LangGraph".to_string(),
            experience_level: ExperienceLevel::Beginner,
            goal_type: LearningGoalType::CodeFocused,
            module_title: "Graphs".to_string(),
            module_topics: vec![],
            challenge: ChallengeBrief {
                challenge_number: 1,
                title: "First graph".to_string(),
                learning_objective: "Wire two nodes".to_string(),
                description: String::new(),
            },
            previous_challenges: vec![],
            upcoming_challenges: vec![],
        }
    }

    #[test]
    fn test_new_state_starts_at_planning() {
        let state = WorkflowState::new(SessionKey::new(7, 2, 1), seed());
        assert_eq!(state.current_stage, WorkflowStage::PlanningResource);
        assert_eq!(state.attempt_count, 0);
        assert!(!state.terminal);
        assert!(state.lesson().is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = WorkflowState::new(SessionKey::new(1, 1, 1), seed());
        for next in [
            WorkflowStage::AuthoringLesson,
            WorkflowStage::AuthoringChallenge,
            WorkflowStage::AwaitingSubmission,
            WorkflowStage::Evaluating,
            WorkflowStage::Remediating,
            WorkflowStage::AwaitingSubmission,
            WorkflowStage::Evaluating,
            WorkflowStage::Passed,
        ] {
            state.transition(next).unwrap();
        }
        assert!(state.terminal);
        assert!(state.completed_at.is_some());
    }

    #[test]
    fn test_skipping_stages_is_rejected() {
        let mut state = WorkflowState::new(SessionKey::new(1, 1, 1), seed());
        let err = state.transition(WorkflowStage::Evaluating).unwrap_err();
        assert_eq!(err.from, WorkflowStage::PlanningResource);
        assert_eq!(state.current_stage, WorkflowStage::PlanningResource);
    }

    #[test]
    fn test_evaluating_may_revert_to_awaiting_only_by_reload() {
        // Rolling back a failed evaluation restores a saved snapshot; it is not
        // a legal forward transition.
        assert!(!WorkflowStage::Evaluating.can_transition_to(WorkflowStage::AwaitingSubmission));
    }

    #[test]
    fn test_terminal_blocks_all_transitions() {
        let mut state = WorkflowState::new(SessionKey::new(1, 1, 1), seed());
        state.current_stage = WorkflowStage::Passed;
        state.terminal = true;
        for next in [
            WorkflowStage::AwaitingSubmission,
            WorkflowStage::Evaluating,
            WorkflowStage::PlanningResource,
        ] {
            assert!(state.transition(next).is_err());
        }
    }

    #[test]
    fn test_stage_ids_per_state() {
        assert_eq!(
            WorkflowStage::PlanningResource.stage_id(),
            Some(StageId::ResourceLookup)
        );
        assert_eq!(WorkflowStage::AwaitingSubmission.stage_id(), None);
        assert_eq!(WorkflowStage::Passed.stage_id(), None);
        assert!(WorkflowStage::AuthoringChallenge.is_authoring());
        assert!(!WorkflowStage::Evaluating.is_authoring());
    }

    #[test]
    fn test_stage_serializes_screaming_snake() {
        let json = serde_json::to_string(&WorkflowStage::AwaitingSubmission).unwrap();
        assert_eq!(json, "\"AWAITING_SUBMISSION\"");
        assert_eq!(
            "REMEDIATING".parse::<WorkflowStage>().unwrap(),
            WorkflowStage::Remediating
        );
    }

    #[test]
    fn test_state_json_roundtrip_keeps_context() {
        let mut state = WorkflowState::new(SessionKey::new(3, 1, 2), seed());
        state.record_output(StageOutput::LessonAuthoring(LessonContent {
            markdown: "# Nodes".to_string(),
        }));
        let json = serde_json::to_string(&state).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.lesson().unwrap().markdown, "# Nodes");
    }

    #[test]
    fn test_submission_result_completeness() {
        let failed = EvaluationOutcome {
            passed: false,
            score: 40,
            errors: vec![],
            feedback: String::new(),
            what_worked: vec![],
            what_needs_work: vec![],
        };
        let mut result = SubmissionResult {
            outcome: failed,
            hint: None,
            attempt_count: 1,
        };
        assert!(!result.is_complete());
        result.hint = Some(RemediationHint {
            hint_level: HintLevel::for_attempts(1),
            targeted_hint: "Look at the loop bound".to_string(),
            encouragement: String::new(),
            key_concept_reminder: None,
        });
        assert!(result.is_complete());
    }
}
