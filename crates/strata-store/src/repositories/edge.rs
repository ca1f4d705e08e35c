//! Edge repository: directed, strength-weighted relations between entities.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use strata_core::time::to_db;
use strata_core::{Edge, EdgeId, EntityId, EventId};

use super::{count, id_list, ts_col};
use crate::errors::Result;

const COLUMNS: &str = "id, source_id, target_id, relation, category, strength, first_seen, last_seen";

/// Relation edges between entities.
pub struct EdgeRepo;

impl EdgeRepo {
    /// Look up the edge for a `(source, target, relation)` triple.
    pub fn find(
        conn: &Connection,
        source_id: &str,
        target_id: &str,
        relation: &str,
    ) -> Result<Option<Edge>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM edges WHERE source_id = ?1 AND target_id = ?2 AND relation = ?3"
        );
        let row = conn
            .query_row(&sql, params![source_id, target_id, relation], map_row)
            .optional()?;
        row.map(|e| hydrate(conn, e)).transpose()
    }

    /// Get an edge by ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<Edge>> {
        let sql = format!("SELECT {COLUMNS} FROM edges WHERE id = ?1");
        let row = conn.query_row(&sql, [id], map_row).optional()?;
        row.map(|e| hydrate(conn, e)).transpose()
    }

    /// Insert a new edge with its event links.
    pub fn insert(conn: &Connection, edge: &Edge) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO edges (id, source_id, target_id, relation, category, strength,
                                first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                edge.id.as_str(),
                edge.source_id.as_str(),
                edge.target_id.as_str(),
                edge.relation,
                edge.category,
                edge.strength.clamp(0.0, 1.0),
                to_db(&edge.first_seen),
                to_db(&edge.last_seen),
            ],
        )?;
        for event_id in &edge.event_ids {
            Self::link_event(conn, &edge.id, event_id)?;
        }
        Ok(())
    }

    /// Store a new strength (clamped to `[0, 1]`) and extend `last_seen`.
    pub fn reinforce(conn: &Connection, id: &str, strength: f64, at: &DateTime<Utc>) -> Result<()> {
        let _ = conn.execute(
            "UPDATE edges SET strength = ?2, last_seen = MAX(last_seen, ?3) WHERE id = ?1",
            params![id, strength.clamp(0.0, 1.0), to_db(at)],
        )?;
        Ok(())
    }

    /// Link a contributing event. Returns `false` if it was already linked.
    pub fn link_event(conn: &Connection, id: &str, event_id: &str) -> Result<bool> {
        let n = conn.execute(
            "INSERT INTO edge_events (edge_id, event_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![id, event_id],
        )?;
        Ok(n > 0)
    }

    /// Edges leaving an entity, strongest first.
    pub fn outgoing(conn: &Connection, entity_id: &str) -> Result<Vec<Edge>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM edges WHERE source_id = ?1 ORDER BY strength DESC, relation ASC"
        );
        query(conn, &sql, [entity_id])
    }

    /// Edges arriving at an entity, strongest first.
    pub fn incoming(conn: &Connection, entity_id: &str) -> Result<Vec<Edge>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM edges WHERE target_id = ?1 ORDER BY strength DESC, relation ASC"
        );
        query(conn, &sql, [entity_id])
    }

    /// Every edge, oldest first.
    pub fn all(conn: &Connection) -> Result<Vec<Edge>> {
        let sql = format!("SELECT {COLUMNS} FROM edges ORDER BY first_seen ASC, id ASC");
        query(conn, &sql, [])
    }

    /// Number of edges touching an entity in either direction.
    pub fn count_for_entity(conn: &Connection, entity_id: &str) -> Result<u64> {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE source_id = ?1 OR target_id = ?1",
            [entity_id],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Number of edges.
    pub fn count(conn: &Connection) -> Result<u64> {
        count(conn, "SELECT COUNT(*) FROM edges")
    }
}

fn query(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Edge>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params, map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(|e| hydrate(conn, e)).collect()
}

fn hydrate(conn: &Connection, mut edge: Edge) -> Result<Edge> {
    edge.event_ids = id_list::<EventId>(
        conn,
        "SELECT event_id FROM edge_events WHERE edge_id = ?1 ORDER BY rowid ASC",
        &edge.id,
    )?;
    Ok(edge)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    Ok(Edge {
        id: EdgeId::from(row.get::<_, String>(0)?),
        source_id: EntityId::from(row.get::<_, String>(1)?),
        target_id: EntityId::from(row.get::<_, String>(2)?),
        relation: row.get(3)?,
        category: row.get(4)?,
        strength: row.get(5)?,
        event_ids: Vec::new(),
        first_seen: ts_col(row, 6)?,
        last_seen: ts_col(row, 7)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
