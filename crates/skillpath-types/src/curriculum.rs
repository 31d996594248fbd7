//! Curriculum domain records.
//!
//! Learning plans and module roadmaps (produced by path generation), and the
//! typed records that flow between challenge stages: resource context, lesson,
//! challenge specification, evaluation outcome and remediation hint.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Learner profile
// ---------------------------------------------------------------------------

/// Self-reported experience level of the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperienceLevel::Beginner => write!(f, "beginner"),
            ExperienceLevel::Intermediate => write!(f, "intermediate"),
            ExperienceLevel::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(ExperienceLevel::Beginner),
            "intermediate" => Ok(ExperienceLevel::Intermediate),
            "advanced" => Ok(ExperienceLevel::Advanced),
            other => Err(format!("unknown experience level: '{other}'")),
        }
    }
}

/// Whether the learning goal is about writing code, understanding concepts, or both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LearningGoalType {
    CodeFocused,
    ConceptFocused,
    #[default]
    Hybrid,
}

// ---------------------------------------------------------------------------
// Learning plan and roadmaps
// ---------------------------------------------------------------------------

/// One module of an approved learning plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleDescriptor {
    pub module_number: u32,
    pub title: String,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Hands-on goals the module's roadmap must slot in after their prerequisites.
    #[serde(default, alias = "hands_on")]
    pub exercises: Vec<String>,
}

/// An approved, ordered learning plan for one user.
///
/// Immutable once approved: the engine only reads module identity and count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPlan {
    pub learning_goal: String,
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub goal_type: LearningGoalType,
    pub modules: Vec<ModuleDescriptor>,
}

impl LearningPlan {
    /// Look up a module by its number.
    pub fn module(&self, module_number: u32) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| m.module_number == module_number)
    }
}

/// Outline of a single challenge inside a module roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChallengeBrief {
    pub challenge_number: u32,
    pub title: String,
    pub learning_objective: String,
    #[serde(default)]
    pub description: String,
}

/// Ordered challenge outline produced for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChallengeRoadmap {
    pub module_number: u32,
    pub module_title: String,
    pub challenges: Vec<ChallengeBrief>,
    #[serde(default)]
    pub progression_notes: String,
}

impl ChallengeRoadmap {
    pub fn total_challenges(&self) -> usize {
        self.challenges.len()
    }

    pub fn challenge(&self, challenge_number: u32) -> Option<&ChallengeBrief> {
        self.challenges
            .iter()
            .find(|c| c.challenge_number == challenge_number)
    }
}

// ---------------------------------------------------------------------------
// Seed context
// ---------------------------------------------------------------------------

/// Everything a challenge workflow needs to know about the learner and the
/// challenge it is preparing. Captured once when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SeedContext {
    pub learning_goal: String,
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub goal_type: LearningGoalType,
    pub module_title: String,
    #[serde(default)]
    pub module_topics: Vec<String>,
    pub challenge: ChallengeBrief,
    /// Challenges of the same module that come before this one.
    #[serde(default)]
    pub previous_challenges: Vec<ChallengeBrief>,
    /// Challenges of the same module still ahead of the learner.
    #[serde(default)]
    pub upcoming_challenges: Vec<ChallengeBrief>,
}

// ---------------------------------------------------------------------------
// Stage records
// ---------------------------------------------------------------------------

/// Reference material gathered for a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceContext {
    pub summary: String,
    #[serde(default)]
    pub references: Vec<String>,
}

/// Rendered lesson, in markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LessonContent {
    pub markdown: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeFormat {
    Code,
    Conceptual,
}

/// The exercise presented to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChallengeSpec {
    pub format: ChallengeFormat,
    pub prompt: String,
    /// Scaffold for code challenges; absent for conceptual ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter_code: Option<String>,
    #[serde(default)]
    pub expected_approach: String,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    /// Progressive hints, least specific first.
    #[serde(default)]
    pub hints_bank: Vec<String>,
}

/// A learner's answer. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Submission(pub String);

impl Submission {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Result of evaluating one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationOutcome {
    pub passed: bool,
    /// 0..=100
    pub score: u8,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub what_worked: Vec<String>,
    #[serde(default)]
    pub what_needs_work: Vec<String>,
}

/// Specificity of a remediation hint, 1 (general nudge) through 3 (nearly the answer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct HintLevel(u8);

impl HintLevel {
    pub const MIN: HintLevel = HintLevel(1);
    pub const MAX: HintLevel = HintLevel(3);

    /// Hint level for the given number of evaluated attempts, clamped to 1..=3.
    pub fn for_attempts(attempt_count: u32) -> Self {
        let level = attempt_count.clamp(Self::MIN.0 as u32, Self::MAX.0 as u32);
        HintLevel(level as u8)
    }

    /// Construct from a raw value, rejecting anything outside 1..=3.
    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0).contains(&level).then_some(HintLevel(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for HintLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX.0)
    }
}

/// Progressive hint produced after a failed evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RemediationHint {
    pub hint_level: HintLevel,
    pub targeted_hint: String,
    #[serde(default)]
    pub encouragement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_concept_reminder: Option<String>,
}

/// Lesson and challenge cached the first time a session reaches the interrupt point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedArtifact {
    pub lesson: LessonContent,
    pub challenge: ChallengeSpec,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_level_for_attempts_clamps() {
        assert_eq!(HintLevel::for_attempts(0).get(), 1);
        assert_eq!(HintLevel::for_attempts(1).get(), 1);
        assert_eq!(HintLevel::for_attempts(2).get(), 2);
        assert_eq!(HintLevel::for_attempts(3).get(), 3);
        assert_eq!(HintLevel::for_attempts(50).get(), 3);
    }

    #[test]
    fn test_hint_level_new_rejects_out_of_range() {
        assert!(HintLevel::new(0).is_none());
        assert!(HintLevel::new(4).is_none());
        assert_eq!(HintLevel::new(2).unwrap().get(), 2);
    }

    #[test]
    fn test_hint_level_serializes_as_integer() {
        let hint = RemediationHint {
            hint_level: HintLevel::for_attempts(2),
            targeted_hint: "Check the parser".to_string(),
            encouragement: String::new(),
            key_concept_reminder: None,
        };
        let json = serde_json::to_value(&hint).unwrap();
        assert_eq!(json["hint_level"], 2);
        assert!(json.get("key_concept_reminder").is_none());
    }

    #[test]
    fn test_module_descriptor_accepts_hands_on_alias() {
        let module: ModuleDescriptor = serde_json::from_str(
            r#"{"module_number": 1, "title": "Basics", "topics": ["a"], "hands_on": ["build x"]}"#,
        )
        .unwrap();
        assert_eq!(module.exercises, vec!["build x"]);
    }

    #[test]
    fn test_learning_plan_goal_type_defaults_to_hybrid() {
        let plan: LearningPlan = serde_json::from_str(
            r#"{"learning_goal": "LangChain", "experience_level": "beginner", "modules": []}"#,
        )
        .unwrap();
        assert_eq!(plan.goal_type, LearningGoalType::Hybrid);
        assert!(plan.module(1).is_none());
    }

    #[test]
    fn test_experience_level_from_str_case_insensitive() {
        assert_eq!(
            "Intermediate".parse::<ExperienceLevel>().unwrap(),
            ExperienceLevel::Intermediate
        );
        assert!("expert".parse::<ExperienceLevel>().is_err());
    }

    #[test]
    fn test_roadmap_lookup() {
        let roadmap = ChallengeRoadmap {
            module_number: 2,
            module_title: "Chains".to_string(),
            challenges: vec![ChallengeBrief {
                challenge_number: 1,
                title: "First chain".to_string(),
                learning_objective: "Compose a prompt and model".to_string(),
                description: String::new(),
            }],
            progression_notes: String::new(),
        };
        assert_eq!(roadmap.total_challenges(), 1);
        assert!(roadmap.challenge(1).is_some());
        assert!(roadmap.challenge(2).is_none());
    }

    #[test]
    fn test_submission_blank_detection() {
        assert!(Submission::new("   \n").is_blank());
        assert!(!Submission::new("print(1)").is_blank());
    }
}
