//! Stage identifiers and typed stage contracts.
//!
//! Every generative or evaluative capability the engine calls is addressed by
//! a [`StageId`] and exchanges one request record and one output record.
//! Requests and outputs are internally tagged by `stage` so a backend can
//! route on the tag and the registry can check an output belongs to the stage
//! that was asked.

use std::fmt;
use std::str::FromStr;

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use crate::curriculum::{
    ChallengeRoadmap, ChallengeSpec, EvaluationOutcome, ExperienceLevel, HintLevel,
    LearningGoalType, LessonContent, ModuleDescriptor, RemediationHint, ResourceContext,
    SeedContext, Submission,
};

// ---------------------------------------------------------------------------
// StageId
// ---------------------------------------------------------------------------

/// Identifier of an external stage capability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    ResourceLookup,
    LessonAuthoring,
    ChallengeAuthoring,
    Evaluation,
    Remediation,
    RoadmapPlanning,
}

impl StageId {
    pub const ALL: [StageId; 6] = [
        StageId::ResourceLookup,
        StageId::LessonAuthoring,
        StageId::ChallengeAuthoring,
        StageId::Evaluation,
        StageId::Remediation,
        StageId::RoadmapPlanning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::ResourceLookup => "resource_lookup",
            StageId::LessonAuthoring => "lesson_authoring",
            StageId::ChallengeAuthoring => "challenge_authoring",
            StageId::Evaluation => "evaluation",
            StageId::Remediation => "remediation",
            StageId::RoadmapPlanning => "roadmap_planning",
        }
    }

    /// JSON Schema of the request record this stage accepts.
    pub fn input_schema(&self) -> serde_json::Value {
        let schema = match self {
            StageId::ResourceLookup => schema_for!(ResourceRequest),
            StageId::LessonAuthoring => schema_for!(LessonRequest),
            StageId::ChallengeAuthoring => schema_for!(ChallengeRequest),
            StageId::Evaluation => schema_for!(EvaluationRequest),
            StageId::Remediation => schema_for!(RemediationRequest),
            StageId::RoadmapPlanning => schema_for!(RoadmapRequest),
        };
        schema.to_value()
    }

    /// JSON Schema of the record this stage must return.
    pub fn output_schema(&self) -> serde_json::Value {
        let schema = match self {
            StageId::ResourceLookup => schema_for!(ResourceContext),
            StageId::LessonAuthoring => schema_for!(LessonContent),
            StageId::ChallengeAuthoring => schema_for!(ChallengeSpec),
            StageId::Evaluation => schema_for!(EvaluationOutcome),
            StageId::Remediation => schema_for!(RemediationHint),
            StageId::RoadmapPlanning => schema_for!(ChallengeRoadmap),
        };
        schema.to_value()
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown stage: '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRequest {
    pub seed: SeedContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LessonRequest {
    pub seed: SeedContext,
    pub resources: ResourceContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChallengeRequest {
    pub seed: SeedContext,
    pub lesson: LessonContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationRequest {
    pub seed: SeedContext,
    pub challenge: ChallengeSpec,
    pub submission: Submission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RemediationRequest {
    pub seed: SeedContext,
    pub challenge: ChallengeSpec,
    /// The solution that was just evaluated.
    pub submission: Submission,
    pub outcome: EvaluationOutcome,
    pub hint_level: HintLevel,
}

/// Roadmap planning works from the plan, not from a challenge seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RoadmapRequest {
    pub learning_goal: String,
    pub experience_level: ExperienceLevel,
    pub goal_type: LearningGoalType,
    pub module: ModuleDescriptor,
}

/// A request addressed to one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageInput {
    ResourceLookup(ResourceRequest),
    LessonAuthoring(LessonRequest),
    ChallengeAuthoring(ChallengeRequest),
    Evaluation(EvaluationRequest),
    Remediation(RemediationRequest),
    RoadmapPlanning(RoadmapRequest),
}

impl StageInput {
    pub fn stage(&self) -> StageId {
        match self {
            StageInput::ResourceLookup(_) => StageId::ResourceLookup,
            StageInput::LessonAuthoring(_) => StageId::LessonAuthoring,
            StageInput::ChallengeAuthoring(_) => StageId::ChallengeAuthoring,
            StageInput::Evaluation(_) => StageId::Evaluation,
            StageInput::Remediation(_) => StageId::Remediation,
            StageInput::RoadmapPlanning(_) => StageId::RoadmapPlanning,
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// The record a stage produced, tagged with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageOutput {
    ResourceLookup(ResourceContext),
    LessonAuthoring(LessonContent),
    ChallengeAuthoring(ChallengeSpec),
    Evaluation(EvaluationOutcome),
    Remediation(RemediationHint),
    RoadmapPlanning(ChallengeRoadmap),
}

impl StageOutput {
    pub fn stage(&self) -> StageId {
        match self {
            StageOutput::ResourceLookup(_) => StageId::ResourceLookup,
            StageOutput::LessonAuthoring(_) => StageId::LessonAuthoring,
            StageOutput::ChallengeAuthoring(_) => StageId::ChallengeAuthoring,
            StageOutput::Evaluation(_) => StageId::Evaluation,
            StageOutput::Remediation(_) => StageId::Remediation,
            StageOutput::RoadmapPlanning(_) => StageId::RoadmapPlanning,
        }
    }
}
