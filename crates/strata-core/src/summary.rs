//! Summary Tree node model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::str_enum;

str_enum! {
    /// Scope a summary node covers.
    NodeType {
        /// Single tree root.
        Root => "root",
        /// One channel.
        Channel => "channel",
        /// All entities of one type.
        EntityType => "entity_type",
        /// One entity.
        Entity => "entity",
        /// One topic.
        Topic => "topic",
        /// Permanent user preferences node.
        Preferences => "preferences",
    }
}

/// A pre-computed summary for one scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryNode {
    /// Unique key (`root`, `channel:<id>`, `entity:<id>`, ...).
    pub key: String,
    /// Scope type.
    pub node_type: NodeType,
    /// Parent key; `None` only for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    /// Generated text (empty until the first refresh).
    #[serde(default)]
    pub summary: String,
    /// Embedding of the summary text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Events observed since the last refresh, including descendants.
    pub staleness: u32,
    /// Last successful refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}
