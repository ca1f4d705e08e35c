//! Context assembly errors.
//!
//! A failing source never fails a build: the assembler logs the error and
//! leaves that section empty.

use thiserror::Error;

/// Failure reading one context source.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Event Store read failure.
    #[error(transparent)]
    Store(#[from] strata_store::StoreError),

    /// Knowledge Graph read failure.
    #[error(transparent)]
    Graph(#[from] strata_graph::GraphError),

    /// Summary Tree read failure.
    #[error(transparent)]
    Summary(#[from] strata_summary::SummaryError),
}

/// Convenience type alias for context results.
pub type Result<T> = std::result::Result<T, ContextError>;
