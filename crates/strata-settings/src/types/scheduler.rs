//! Background scheduler and Summary Tree settings.

use serde::{Deserialize, Serialize};

/// Extraction Scheduler settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerSettings {
    /// Pending events processed per cycle.
    pub batch_size: usize,
    /// Interval between cycles.
    pub cycle_interval_ms: u64,
    /// A cycle is skipped while the last inbound interaction is younger than this.
    pub quiet_threshold_ms: u64,
    /// Upper bound on one extract / embed / summarize call.
    pub call_timeout_ms: u64,
    /// Apply decay on every Nth cycle that runs.
    pub decay_every_cycles: u32,
    /// Apply access boost on every Nth cycle that runs.
    pub boost_every_cycles: u32,
    /// Grace period for the background task on shutdown.
    pub shutdown_grace_ms: u64,
    /// Upper bound on the extra wait after consecutive storage failures.
    pub max_backoff_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            cycle_interval_ms: 30_000,
            quiet_threshold_ms: 60_000,
            call_timeout_ms: 30_000,
            decay_every_cycles: 10,
            boost_every_cycles: 10,
            shutdown_grace_ms: 5_000,
            max_backoff_ms: 600_000,
        }
    }
}

/// Summary Tree settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarySettings {
    /// A node becomes a refresh candidate when its staleness exceeds this.
    pub staleness_threshold: u32,
    /// Nodes refreshed per cycle.
    pub max_refresh_batch: usize,
    /// Scoped items handed to the summarizer per refresh.
    pub max_scope_items: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            staleness_threshold: 5,
            max_refresh_batch: 3,
            max_scope_items: 50,
        }
    }
}
