//! Stage capabilities: the opaque generative and evaluative calls the
//! challenge workflow sequences.
//!
//! A [`StageHandler`] turns a [`StageInput`](skillpath_types::stage::StageInput)
//! into a [`StageOutput`](skillpath_types::stage::StageOutput) or fails with a
//! [`StageError`] that the retry controller can classify.

pub mod box_handler;
pub mod contract;
pub mod handler;
pub mod registry;

use std::time::Duration;

use skillpath_types::stage::StageId;

/// Retry classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimited,
    Transient,
    Fatal,
}

/// Errors raised by a stage invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    #[error("rate limited (retry after {retry_after_ms:?}ms): {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("transient stage failure: {0}")]
    Transient(String),

    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    #[error("stage failed: {0}")]
    Fatal(String),

    #[error("contract violation: {0}")]
    Contract(String),

    #[error("no handler registered for stage {0}")]
    NotRegistered(StageId),
}

impl StageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StageError::RateLimited { .. } => ErrorClass::RateLimited,
            StageError::Transient(_) | StageError::Timeout(_) => ErrorClass::Transient,
            StageError::Fatal(_) | StageError::Contract(_) | StageError::NotRegistered(_) => {
                ErrorClass::Fatal
            }
        }
    }

    /// Minimum wait requested by the backend, if it sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            StageError::RateLimited {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}
