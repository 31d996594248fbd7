//! StageHandler trait definition.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
//! Implementations must be safe to re-invoke with the same input: the retry
//! controller and crash recovery both repeat calls.

use skillpath_types::stage::{StageInput, StageOutput};

use super::StageError;

/// A backend able to run one or more stages.
pub trait StageHandler: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Run the stage addressed by `input`.
    fn invoke(
        &self,
        input: StageInput,
    ) -> impl std::future::Future<Output = Result<StageOutput, StageError>> + Send;
}
