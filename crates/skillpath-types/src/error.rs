use thiserror::Error;

/// Errors from repository operations (used by trait definitions in skillpath-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}
