//! Curriculum repository trait definition.
//!
//! Storage interface for approved learning plans and the per-module challenge
//! roadmaps generated from them.

use skillpath_types::curriculum::{ChallengeRoadmap, LearningPlan};
use skillpath_types::error::RepositoryError;

/// Repository trait for learning plans and roadmaps.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CurriculumStore: Send + Sync {
    /// Upsert the user's approved plan.
    fn save_plan(
        &self,
        user_id: i64,
        plan: &LearningPlan,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn load_plan(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<LearningPlan>, RepositoryError>> + Send;

    /// Upsert a module roadmap for the user.
    fn save_roadmap(
        &self,
        user_id: i64,
        roadmap: &ChallengeRoadmap,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn load_roadmap(
        &self,
        user_id: i64,
        module_number: u32,
    ) -> impl std::future::Future<Output = Result<Option<ChallengeRoadmap>, RepositoryError>> + Send;

    /// All roadmaps of a user, ordered by module number.
    fn list_roadmaps(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChallengeRoadmap>, RepositoryError>> + Send;

    /// Drop every roadmap of the user. Returns how many were removed.
    fn delete_roadmaps(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
