//! Per-cycle report.

use serde::Serialize;

/// Whether a cycle did any work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Recent activity; nothing ran.
    Skipped,
    /// The sub-steps ran.
    Ran,
}

/// What one scheduler cycle did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Run-cycle counter after this cycle (unchanged by skipped cycles).
    pub cycle: u64,
    /// Skipped or ran.
    pub outcome: CycleOutcome,
    /// Events whose extraction was applied.
    pub extracted: usize,
    /// Events marked `failed` (will be retried once).
    pub failed: usize,
    /// Events marked `skipped` (empty content or second failure).
    pub skipped: usize,
    /// Summary nodes refreshed.
    pub refreshed: usize,
    /// Summary refreshes that failed.
    pub refresh_failed: usize,
    /// Event scores changed by decay (0 when decay did not run).
    pub decayed: usize,
    /// Events boosted (0 when the boost did not run).
    pub boosted: usize,
    /// Every recorded failure, with the event id or node key.
    pub errors: Vec<String>,
    /// Whether a storage read or pass failed outright (not a single item).
    pub storage_failed: bool,
}

impl CycleReport {
    pub(crate) fn new(cycle: u64, outcome: CycleOutcome) -> Self {
        Self {
            cycle,
            outcome,
            extracted: 0,
            failed: 0,
            skipped: 0,
            refreshed: 0,
            refresh_failed: 0,
            decayed: 0,
            boosted: 0,
            errors: Vec::new(),
            storage_failed: false,
        }
    }

    /// Whether the cycle ran.
    pub fn ran(&self) -> bool {
        self.outcome == CycleOutcome::Ran
    }

    /// Events touched by the extraction step.
    pub fn processed(&self) -> usize {
        self.extracted + self.failed + self.skipped
    }
}
