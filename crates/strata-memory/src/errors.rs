//! Errors surfaced to callers of [`MemorySystem`](crate::MemorySystem).

use thiserror::Error;

/// Errors from the memory facade.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Settings failed validation.
    #[error(transparent)]
    Settings(#[from] strata_settings::SettingsError),

    /// Storage failure. Appends surface this directly.
    #[error(transparent)]
    Store(#[from] strata_store::StoreError),

    /// Knowledge Graph failure.
    #[error(transparent)]
    Graph(#[from] strata_graph::GraphError),

    /// Summary Tree failure.
    #[error(transparent)]
    Summary(#[from] strata_summary::SummaryError),

    /// Background task failure.
    #[error(transparent)]
    Scheduler(#[from] strata_scheduler::SchedulerError),

    /// Event metadata rejected at the boundary.
    #[error(transparent)]
    Metadata(#[from] strata_core::MetadataError),

    /// A redaction or forget pattern is not a valid regex.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience type alias for facade results.
pub type Result<T> = std::result::Result<T, MemoryError>;
