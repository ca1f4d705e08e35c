//! Knowledge Graph settings.

use serde::{Deserialize, Serialize};

/// Entity resolution and upsert tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphSettings {
    /// Minimum name-embedding cosine similarity to merge into an existing entity.
    pub entity_merge_threshold: f64,
    /// Minimum literal similarity for two fact objects to count as the same value.
    pub fact_similarity_threshold: f64,
    /// Strength of a newly created edge.
    pub edge_initial_strength: f64,
    /// Strength added on each re-mention (saturating at 1.0).
    pub edge_strength_step: f64,
    /// Minimum centroid similarity to attach a label to an existing topic.
    pub topic_merge_threshold: f64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            entity_merge_threshold: 0.85,
            fact_similarity_threshold: 0.9,
            edge_initial_strength: 0.5,
            edge_strength_step: 0.1,
            topic_merge_threshold: 0.8,
        }
    }
}
