//! Summary Tree errors.

use strata_core::BackendError;
use thiserror::Error;

/// Errors raised while maintaining or refreshing the Summary Tree.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] strata_store::StoreError),

    /// Graph read failure while gathering a node's scope.
    #[error(transparent)]
    Graph(#[from] strata_graph::GraphError),

    /// The summarizer failed or timed out.
    #[error("summarize failed for {node_key}: {source}")]
    Backend {
        /// Node being refreshed.
        node_key: String,
        /// Underlying failure.
        #[source]
        source: BackendError,
    },

    /// The node does not exist (deleted between selection and refresh).
    #[error("summary node not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for SummaryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.into())
    }
}

/// Convenience type alias for summary results.
pub type Result<T> = std::result::Result<T, SummaryError>;
