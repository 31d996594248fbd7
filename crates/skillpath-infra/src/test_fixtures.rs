//! Shared records for SQLite store tests.

use chrono::Utc;
use skillpath_types::curriculum::{
    CachedArtifact, ChallengeBrief, ChallengeFormat, ChallengeRoadmap, ChallengeSpec,
    ExperienceLevel, LearningGoalType, LearningPlan, LessonContent, ModuleDescriptor, SeedContext,
};

pub(crate) fn sample_seed() -> SeedContext {
    SeedContext {
        learning_goal: "Build retrieval-augmented apps".to_string(),
        experience_level: ExperienceLevel::Beginner,
        goal_type: LearningGoalType::CodeFocused,
        module_title: "Embeddings".to_string(),
        module_topics: vec![],
        challenge: ChallengeBrief {
            challenge_number: 1,
            title: "Cosine similarity".to_string(),
            learning_objective: "Compare two embedding vectors".to_string(),
            description: String::new(),
        },
        previous_challenges: vec![],
        upcoming_challenges: vec![],
    }
}

pub(crate) fn sample_artifact() -> CachedArtifact {
    CachedArtifact {
        lesson: LessonContent {
            markdown: "# Vectors\n\nA vector is a list of numbers.".to_string(),
        },
        challenge: ChallengeSpec {
            format: ChallengeFormat::Code,
            prompt: "Write cosine_similarity(a, b)".to_string(),
            starter_code: None,
            expected_approach: "dot product over norms".to_string(),
            success_criteria: vec!["handles zero vectors".to_string()],
            hints_bank: vec![],
        },
        created_at: Utc::now(),
    }
}

pub(crate) fn sample_plan() -> LearningPlan {
    LearningPlan {
        learning_goal: "Build retrieval-augmented apps".to_string(),
        experience_level: ExperienceLevel::Advanced,
        goal_type: LearningGoalType::Hybrid,
        modules: vec![
            ModuleDescriptor {
                module_number: 1,
                title: "Embeddings".to_string(),
                topics: vec!["vectors".to_string()],
                exercises: vec![],
            },
            ModuleDescriptor {
                module_number: 2,
                title: "Retrieval".to_string(),
                topics: vec!["chunking".to_string(), "ranking".to_string()],
                exercises: vec!["build an index".to_string()],
            },
        ],
    }
}

pub(crate) fn sample_roadmap(module_number: u32) -> ChallengeRoadmap {
    ChallengeRoadmap {
        module_number,
        module_title: format!("Module {module_number}"),
        challenges: vec![ChallengeBrief {
            challenge_number: 1,
            title: "Warm-up".to_string(),
            learning_objective: "Recall the basics".to_string(),
            description: String::new(),
        }],
        progression_notes: "Start small".to_string(),
    }
}
