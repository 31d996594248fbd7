//! BoxStageHandler -- object-safe dynamic dispatch wrapper for StageHandler.
//!
//! 1. Define an object-safe `StageHandlerDyn` trait with boxed futures
//! 2. Blanket-impl `StageHandlerDyn` for all `T: StageHandler`
//! 3. `BoxStageHandler` wraps `Arc<dyn StageHandlerDyn>` and delegates
//!
//! The handle is cheap to clone so one backend can serve several stages.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use skillpath_types::stage::{StageInput, StageOutput};

use super::StageError;
use super::handler::StageHandler;

/// Object-safe version of [`StageHandler`] with boxed futures.
pub trait StageHandlerDyn: Send + Sync {
    fn name(&self) -> &str;

    fn invoke_boxed(&self, input: StageInput) -> BoxFuture<'_, Result<StageOutput, StageError>>;
}

impl<T: StageHandler> StageHandlerDyn for T {
    fn name(&self) -> &str {
        StageHandler::name(self)
    }

    fn invoke_boxed(&self, input: StageInput) -> BoxFuture<'_, Result<StageOutput, StageError>> {
        Box::pin(self.invoke(input))
    }
}

/// Type-erased stage handler.
///
/// Since `StageHandler` uses RPITIT, it cannot be used as a trait object
/// directly.
#[derive(Clone)]
pub struct BoxStageHandler {
    inner: Arc<dyn StageHandlerDyn>,
}

impl BoxStageHandler {
    pub fn new<T: StageHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn invoke(&self, input: StageInput) -> Result<StageOutput, StageError> {
        self.inner.invoke_boxed(input).await
    }
}

impl std::fmt::Debug for BoxStageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxStageHandler")
            .field("name", &self.name())
            .finish()
    }
}
