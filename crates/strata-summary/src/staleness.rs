//! Node creation and staleness accounting.
//!
//! Marking a node stale adds one to the node and to every ancestor, so the
//! root's counter reflects all unrefreshed activity. A refresh resets the
//! node to zero and takes the node's own count back out of its ancestors,
//! saturating at zero.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use strata_core::{EntityId, EntityType, NodeType, TopicId};
use strata_store::repositories::summary::SummaryRepo;
use tracing::debug;

use crate::errors::{Result, SummaryError};
use crate::keys::{
    PREFERENCES_KEY, ROOT_KEY, channel_key, entity_key, entity_type_key, topic_key,
};

/// Which scopes one extracted event touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaleMarks {
    /// Channel the event arrived on.
    pub channel: Option<String>,
    /// Entities mentioned, with their types.
    pub entities: Vec<(EntityId, EntityType)>,
    /// Topics the event was linked to.
    pub topics: Vec<TopicId>,
    /// Whether a preference fact changed.
    pub preferences: bool,
}

/// Create the root and the permanent preferences node if missing.
pub fn ensure_permanent(conn: &Connection) -> Result<()> {
    let _ = SummaryRepo::ensure(conn, ROOT_KEY, NodeType::Root, None)?;
    let _ = SummaryRepo::ensure(conn, PREFERENCES_KEY, NodeType::Preferences, Some(ROOT_KEY))?;
    Ok(())
}

/// Ensure `channel:<channel>` exists and return its key.
pub fn ensure_channel(conn: &Connection, channel: &str) -> Result<String> {
    ensure_permanent(conn)?;
    let key = channel_key(channel);
    let _ = SummaryRepo::ensure(conn, &key, NodeType::Channel, Some(ROOT_KEY))?;
    Ok(key)
}

/// Ensure `topic:<id>` exists and return its key.
pub fn ensure_topic(conn: &Connection, topic_id: &str) -> Result<String> {
    ensure_permanent(conn)?;
    let key = topic_key(topic_id);
    let _ = SummaryRepo::ensure(conn, &key, NodeType::Topic, Some(ROOT_KEY))?;
    Ok(key)
}

/// Ensure `entity:<id>` and its `entity_type:<type>` parent exist and
/// return the entity node's key.
pub fn ensure_entity(conn: &Connection, entity_id: &str, entity_type: EntityType) -> Result<String> {
    ensure_permanent(conn)?;
    let parent = entity_type_key(entity_type);
    let _ = SummaryRepo::ensure(conn, &parent, NodeType::EntityType, Some(ROOT_KEY))?;
    let key = entity_key(entity_id);
    let _ = SummaryRepo::ensure(conn, &key, NodeType::Entity, Some(&parent))?;
    Ok(key)
}

/// Add one to `key` and to each of its ancestors.
pub fn mark_stale(conn: &Connection, key: &str) -> Result<()> {
    if SummaryRepo::get(conn, key)?.is_none() {
        return Err(SummaryError::NotFound(key.to_string()));
    }
    SummaryRepo::add_staleness(conn, key, 1)?;
    for ancestor in SummaryRepo::ancestors(conn, key)? {
        SummaryRepo::add_staleness(conn, &ancestor, 1)?;
    }
    Ok(())
}

/// Create any missing nodes for `marks` and mark each touched scope stale
/// once. Returns the marked keys.
pub fn apply_marks(conn: &Connection, marks: &StaleMarks) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    if let Some(channel) = &marks.channel {
        keys.push(ensure_channel(conn, channel)?);
    }
    for (entity_id, entity_type) in &marks.entities {
        keys.push(ensure_entity(conn, entity_id, *entity_type)?);
    }
    for topic_id in &marks.topics {
        keys.push(ensure_topic(conn, topic_id)?);
    }
    if marks.preferences {
        ensure_permanent(conn)?;
        keys.push(PREFERENCES_KEY.to_string());
    }
    keys.sort();
    keys.dedup();
    for key in &keys {
        mark_stale(conn, key)?;
    }
    debug!(marked = keys.len(), "summary nodes marked stale");
    Ok(keys)
}

/// Store a refreshed summary, reset the node and release its count from
/// the ancestors. Returns the staleness that was cleared.
pub fn mark_refreshed(
    conn: &Connection,
    key: &str,
    summary: &str,
    embedding: Option<&Vec<f32>>,
    at: &DateTime<Utc>,
) -> Result<u32> {
    let node = SummaryRepo::get(conn, key)?.ok_or_else(|| SummaryError::NotFound(key.to_string()))?;
    let _ = SummaryRepo::set_summary(conn, key, summary, embedding, at)?;
    release(conn, key, node.staleness)?;
    Ok(node.staleness)
}

/// Delete a node (and its subtree), releasing its count from the ancestors.
/// Returns `false` if the node did not exist. Permanent nodes are kept.
pub fn remove_node(conn: &Connection, key: &str) -> Result<bool> {
    if key == ROOT_KEY || key == PREFERENCES_KEY {
        return Ok(false);
    }
    let Some(node) = SummaryRepo::get(conn, key)? else {
        return Ok(false);
    };
    release(conn, key, node.staleness)?;
    Ok(SummaryRepo::delete(conn, key)?)
}

fn release(conn: &Connection, key: &str, amount: u32) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    for ancestor in SummaryRepo::ancestors(conn, key)? {
        SummaryRepo::sub_staleness(conn, &ancestor, amount)?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
