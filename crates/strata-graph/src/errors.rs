//! Knowledge Graph errors.

use thiserror::Error;

/// Errors raised while updating or reading the Knowledge Graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] strata_store::StoreError),

    /// Extraction output that cannot be applied (unknown names, empty labels).
    #[error("invalid extraction: {0}")]
    Invalid(String),
}

impl From<rusqlite::Error> for GraphError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.into())
    }
}

/// Convenience type alias for graph results.
pub type Result<T> = std::result::Result<T, GraphError>;
