//! Topic clustering.
//!
//! A label resolves to a topic by exact normalised label first, then by
//! centroid similarity to the event's embedding, else a new topic. Linking
//! an event folds its embedding into the topic centroid as a running mean.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use strata_core::text::normalize;
use strata_core::{EventId, Topic, TopicId};
use strata_embeddings::{best_match, running_mean};
use strata_settings::GraphSettings;
use strata_store::repositories::topic::TopicRepo;
use tracing::debug;

use crate::errors::{GraphError, Result};

/// Resolve `label` to a topic and link the event to it.
pub fn assign_topic(
    conn: &Connection,
    label: &str,
    event_id: &EventId,
    embedding: Option<&[f32]>,
    at: &DateTime<Utc>,
    settings: &GraphSettings,
) -> Result<TopicId> {
    let label = normalize(label);
    if label.is_empty() {
        return Err(GraphError::Invalid("empty topic label".into()));
    }

    let existing = match TopicRepo::find_by_label(conn, &label)? {
        Some(topic) => Some(topic),
        None => match embedding {
            Some(v) => best_match(
                v,
                TopicRepo::with_centroids(conn)?,
                settings.topic_merge_threshold,
                |t: &Topic| t.updated_at,
            )
            .map(|m| m.item),
            None => None,
        },
    };

    let topic = match existing {
        Some(topic) => topic,
        None => {
            let topic = Topic {
                id: TopicId::new(),
                label,
                centroid: None,
                event_count: 0,
                created_at: *at,
                updated_at: *at,
            };
            TopicRepo::insert(conn, &topic)?;
            debug!(topic_id = %topic.id, label = %topic.label, "topic created");
            topic
        }
    };

    let centroid = embedding.map(|v| running_mean(topic.centroid.as_deref(), topic.event_count, v));
    let _ = TopicRepo::link_event(conn, &topic.id, event_id, centroid.as_ref(), at)?;
    Ok(topic.id)
}
