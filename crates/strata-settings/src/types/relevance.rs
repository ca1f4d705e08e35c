//! Relevance and decay settings.

use serde::{Deserialize, Serialize};

/// Relevance & Decay Engine tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelevanceSettings {
    /// Per-day multiplicative decay factor in `(0, 1]`.
    pub decay_rate: f64,
    /// Scores never fall below this.
    pub score_floor: f64,
    /// Only events older than this are decayed.
    pub decay_age_cutoff_hours: u64,
    /// Multiplier applied on access.
    pub boost_factor: f64,
    /// Events accessed within this window are boosted.
    pub access_window_hours: u64,
    /// Half-life for learning weights.
    pub learning_half_life_days: f64,
}

impl Default for RelevanceSettings {
    fn default() -> Self {
        Self {
            decay_rate: 0.95,
            score_floor: 0.05,
            decay_age_cutoff_hours: 24,
            boost_factor: 1.2,
            access_window_hours: 24,
            learning_half_life_days: 30.0,
        }
    }
}
