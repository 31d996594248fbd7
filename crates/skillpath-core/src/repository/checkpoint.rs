//! Checkpoint repository trait definition.
//!
//! Storage interface for workflow states and cached artifacts, both keyed by
//! session key. The infrastructure layer (skillpath-infra) implements this
//! trait with SQLite persistence.

use skillpath_types::curriculum::CachedArtifact;
use skillpath_types::error::RepositoryError;
use skillpath_types::session::SessionKey;
use skillpath_types::workflow::WorkflowState;

/// Repository trait for checkpoint persistence.
///
/// Writes are atomic per record and last-writer-wins per key: a reader never
/// observes a partially written state.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CheckpointStore: Send + Sync {
    /// Upsert the state for its session key.
    fn save_state(
        &self,
        state: &WorkflowState,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert the state only if no state exists for its key.
    ///
    /// Returns `true` when this call created the record. Two concurrent calls
    /// for the same key must not both return `true`.
    fn create_state_if_absent(
        &self,
        state: &WorkflowState,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn load_state(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowState>, RepositoryError>> + Send;

    /// All states belonging to a user, ordered by module then challenge.
    fn list_states(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowState>, RepositoryError>> + Send;

    /// Upsert the cached artifact for a session key.
    fn save_artifact(
        &self,
        key: &SessionKey,
        artifact: &CachedArtifact,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn load_artifact(
        &self,
        key: &SessionKey,
    ) -> impl std::future::Future<Output = Result<Option<CachedArtifact>, RepositoryError>> + Send;
}
