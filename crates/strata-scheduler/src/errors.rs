//! Scheduler errors.
//!
//! These never escape a cycle: each is logged with the event id or node key
//! and recorded in the [`CycleReport`](crate::CycleReport).

use strata_core::BackendError;
use thiserror::Error;

/// Failure of one scheduler sub-step.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] strata_store::StoreError),

    /// Graph update failure.
    #[error(transparent)]
    Graph(#[from] strata_graph::GraphError),

    /// Summary Tree failure.
    #[error(transparent)]
    Summary(#[from] strata_summary::SummaryError),

    /// Extractor or embedder failure, including timeouts.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The background task did not stop within its grace period.
    #[error("background task aborted after {grace_ms}ms grace period")]
    Aborted {
        /// Grace period that elapsed.
        grace_ms: u64,
    },
}

/// Convenience type alias for scheduler results.
pub type Result<T> = std::result::Result<T, SchedulerError>;
