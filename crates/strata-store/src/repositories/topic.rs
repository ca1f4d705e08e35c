//! Topic repository: theme clusters and their event links.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use strata_core::text::normalize;
use strata_core::time::to_db;
use strata_core::{EventId, Topic, TopicId};

use super::{blob, count, id_list, sql_limit, ts_col, vec_col};
use crate::errors::Result;

const COLUMNS: &str = "id, label, centroid, event_count, created_at, updated_at";

/// Topic repository.
pub struct TopicRepo;

impl TopicRepo {
    /// Find a topic by its normalised label.
    pub fn find_by_label(conn: &Connection, label: &str) -> Result<Option<Topic>> {
        let sql = format!("SELECT {COLUMNS} FROM topics WHERE label_key = ?1");
        Ok(conn.query_row(&sql, [normalize(label)], map_row).optional()?)
    }

    /// Get a topic by ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<Topic>> {
        let sql = format!("SELECT {COLUMNS} FROM topics WHERE id = ?1");
        Ok(conn.query_row(&sql, [id], map_row).optional()?)
    }

    /// Topics that have a centroid, as `(topic, centroid)` pairs.
    pub fn with_centroids(conn: &Connection) -> Result<Vec<(Topic, Vec<f32>)>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM topics WHERE centroid IS NOT NULL ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|t| {
                let centroid = t.centroid.clone()?;
                Some((t, centroid))
            })
            .collect())
    }

    /// Insert a new topic.
    pub fn insert(conn: &Connection, topic: &Topic) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO topics (id, label, label_key, centroid, event_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                topic.id.as_str(),
                topic.label,
                normalize(&topic.label),
                blob(topic.centroid.as_ref()),
                topic.event_count,
                to_db(&topic.created_at),
                to_db(&topic.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Link an event. Returns `false` if it was already linked, in which
    /// case the count and centroid are left alone.
    pub fn link_event(
        conn: &Connection,
        id: &str,
        event_id: &str,
        centroid: Option<&Vec<f32>>,
        at: &DateTime<Utc>,
    ) -> Result<bool> {
        let linked = conn.execute(
            "INSERT INTO event_topics (event_id, topic_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![event_id, id],
        )?;
        if linked == 0 {
            return Ok(false);
        }
        let _ = conn.execute(
            "UPDATE topics
             SET event_count = event_count + 1, centroid = COALESCE(?2, centroid), updated_at = ?3
             WHERE id = ?1",
            params![id, blob(centroid), to_db(at)],
        )?;
        Ok(true)
    }

    /// Event IDs linked to a topic, in link order.
    pub fn event_ids(conn: &Connection, id: &str) -> Result<Vec<EventId>> {
        Ok(id_list(
            conn,
            "SELECT event_id FROM event_topics WHERE topic_id = ?1 ORDER BY rowid ASC",
            id,
        )?)
    }

    /// Topics an event belongs to.
    pub fn for_event(conn: &Connection, event_id: &str) -> Result<Vec<TopicId>> {
        Ok(id_list(
            conn,
            "SELECT topic_id FROM event_topics WHERE event_id = ?1 ORDER BY rowid ASC",
            event_id,
        )?)
    }

    /// Largest topics first, most recently updated on ties.
    pub fn top(conn: &Connection, limit: usize) -> Result<Vec<Topic>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM topics
             ORDER BY event_count DESC, updated_at DESC, id ASC LIMIT ?1"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map([sql_limit(limit)], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every topic, oldest first.
    pub fn all(conn: &Connection) -> Result<Vec<Topic>> {
        let sql = format!("SELECT {COLUMNS} FROM topics ORDER BY created_at ASC, id ASC");
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every `(event_id, topic_id)` link.
    pub fn all_links(conn: &Connection) -> Result<Vec<(EventId, TopicId)>> {
        let mut stmt =
            conn.prepare_cached("SELECT event_id, topic_id FROM event_topics ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    EventId::from(row.get::<_, String>(0)?),
                    TopicId::from(row.get::<_, String>(1)?),
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert a raw link (import path). Returns `false` if it existed.
    pub fn insert_link(conn: &Connection, event_id: &str, topic_id: &str) -> Result<bool> {
        let n = conn.execute(
            "INSERT INTO event_topics (event_id, topic_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![event_id, topic_id],
        )?;
        Ok(n > 0)
    }

    /// Recount linked events for every topic (after events are deleted).
    pub fn recount(conn: &Connection) -> Result<()> {
        let _ = conn.execute(
            "UPDATE topics
             SET event_count = (SELECT COUNT(*) FROM event_topics WHERE topic_id = topics.id)",
            [],
        )?;
        Ok(())
    }

    /// Number of topics.
    pub fn count(conn: &Connection) -> Result<u64> {
        count(conn, "SELECT COUNT(*) FROM topics")
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: TopicId::from(row.get::<_, String>(0)?),
        label: row.get(1)?,
        centroid: vec_col(row, 2)?,
        event_count: row.get(3)?,
        created_at: ts_col(row, 4)?,
        updated_at: ts_col(row, 5)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
