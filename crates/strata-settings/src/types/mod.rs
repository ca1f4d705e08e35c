//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format and `#[serde(default)]` so partial files deserialize, with
//! missing fields taking their compiled default.

mod context;
mod graph;
mod relevance;
mod scheduler;
mod store;

pub use context::*;
pub use graph::*;
pub use relevance::*;
pub use scheduler::*;
pub use store::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the memory subsystem.
///
/// Immutable once loaded; components receive it (or the relevant section)
/// at construction.
///
/// ```json
/// {
///   "store": { "path": "/var/lib/strata/memory.db" },
///   "scheduler": { "batchSize": 50 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrataSettings {
    /// Settings schema version.
    pub version: String,
    /// Persistence settings.
    pub store: StoreSettings,
    /// Background scheduler settings.
    pub scheduler: SchedulerSettings,
    /// Summary Tree settings.
    pub summary: SummarySettings,
    /// Knowledge Graph settings.
    pub graph: GraphSettings,
    /// Relevance and decay settings.
    pub relevance: RelevanceSettings,
    /// Context assembly settings.
    pub context: ContextSettings,
    /// Redaction applied before events are persisted.
    pub redaction: RedactionSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for StrataSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            store: StoreSettings::default(),
            scheduler: SchedulerSettings::default(),
            summary: SummarySettings::default(),
            graph: GraphSettings::default(),
            relevance: RelevanceSettings::default(),
            context: ContextSettings::default(),
            redaction: RedactionSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl StrataSettings {
    /// Reject out-of-range or inconsistent values.
    pub fn validate(&self) -> Result<()> {
        if self.store.pool_size == 0 {
            return invalid("store.poolSize must be > 0");
        }
        if self.scheduler.batch_size == 0 {
            return invalid("scheduler.batchSize must be > 0");
        }
        if self.scheduler.cycle_interval_ms == 0 {
            return invalid("scheduler.cycleIntervalMs must be > 0");
        }
        if self.scheduler.call_timeout_ms == 0 {
            return invalid("scheduler.callTimeoutMs must be > 0");
        }
        if self.scheduler.decay_every_cycles == 0 || self.scheduler.boost_every_cycles == 0 {
            return invalid("scheduler decay/boost cadence must be >= 1 cycle");
        }
        if self.summary.max_refresh_batch == 0 {
            return invalid("summary.maxRefreshBatch must be > 0");
        }

        let g = &self.graph;
        unit("graph.entityMergeThreshold", g.entity_merge_threshold)?;
        unit("graph.factSimilarityThreshold", g.fact_similarity_threshold)?;
        unit("graph.edgeInitialStrength", g.edge_initial_strength)?;
        unit("graph.edgeStrengthStep", g.edge_strength_step)?;
        unit("graph.topicMergeThreshold", g.topic_merge_threshold)?;

        let r = &self.relevance;
        if !(r.decay_rate > 0.0 && r.decay_rate <= 1.0) {
            return invalid(format!("relevance.decayRate must be in (0, 1], got {}", r.decay_rate));
        }
        unit("relevance.scoreFloor", r.score_floor)?;
        if !(r.boost_factor.is_finite() && r.boost_factor >= 1.0) {
            return invalid(format!("relevance.boostFactor must be >= 1, got {}", r.boost_factor));
        }
        if !(r.learning_half_life_days.is_finite() && r.learning_half_life_days > 0.0) {
            return invalid("relevance.learningHalfLifeDays must be > 0");
        }

        if self.context.total_budget == 0 {
            return invalid("context.totalBudget must be > 0");
        }
        if self.context.sections.sum() == 0 {
            return invalid("context.sections budgets sum to zero");
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Result<()> {
    Err(SettingsError::InvalidValue(msg.into()))
}

fn unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        invalid(format!("{name} must be in [0, 1], got {value}"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
