//! Summary node repository.
//!
//! Staleness arithmetic happens in SQL so that increments and saturating
//! decrements are single statements.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use strata_core::time::to_db;
use strata_core::{NodeType, SummaryNode};

use super::{blob, count, enum_col, opt_ts_col, sql_limit, vec_col};
use crate::errors::Result;

const COLUMNS: &str = "key, node_type, parent_key, summary, embedding, staleness, last_updated";

/// Summary node rows.
pub struct SummaryRepo;

impl SummaryRepo {
    /// Create a node if it does not exist. Returns `true` when created.
    ///
    /// Only a key conflict is ignored; a node breaking the parent rule is
    /// an error.
    pub fn ensure(
        conn: &Connection,
        key: &str,
        node_type: NodeType,
        parent_key: Option<&str>,
    ) -> Result<bool> {
        let n = conn.execute(
            "INSERT INTO summary_nodes (key, node_type, parent_key) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO NOTHING",
            params![key, node_type.as_str(), parent_key],
        )?;
        Ok(n > 0)
    }

    /// Insert a full node (import path). Returns `false` if the key exists.
    pub fn insert(conn: &Connection, node: &SummaryNode) -> Result<bool> {
        let n = conn.execute(
            "INSERT INTO summary_nodes
                 (key, node_type, parent_key, summary, embedding, staleness, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (key) DO NOTHING",
            params![
                node.key,
                node.node_type.as_str(),
                node.parent_key,
                node.summary,
                blob(node.embedding.as_ref()),
                node.staleness,
                node.last_updated.as_ref().map(to_db),
            ],
        )?;
        Ok(n > 0)
    }

    /// Get a node by key.
    pub fn get(conn: &Connection, key: &str) -> Result<Option<SummaryNode>> {
        let sql = format!("SELECT {COLUMNS} FROM summary_nodes WHERE key = ?1");
        Ok(conn.query_row(&sql, [key], map_row).optional()?)
    }

    /// Keys from `key`'s parent up to the root, nearest first.
    pub fn ancestors(conn: &Connection, key: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "WITH RECURSIVE chain(key, parent_key, depth) AS (
                 SELECT key, parent_key, 0 FROM summary_nodes WHERE key = ?1
                 UNION ALL
                 SELECT n.key, n.parent_key, c.depth + 1
                 FROM summary_nodes n JOIN chain c ON n.key = c.parent_key
                 WHERE c.depth < 64
             )
             SELECT key FROM chain WHERE depth > 0 ORDER BY depth ASC",
        )?;
        let rows = stmt
            .query_map([key], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Add to a node's staleness.
    pub fn add_staleness(conn: &Connection, key: &str, amount: u32) -> Result<()> {
        let _ = conn.execute(
            "UPDATE summary_nodes SET staleness = staleness + ?2 WHERE key = ?1",
            params![key, amount],
        )?;
        Ok(())
    }

    /// Subtract from a node's staleness, never going below zero.
    pub fn sub_staleness(conn: &Connection, key: &str, amount: u32) -> Result<()> {
        let _ = conn.execute(
            "UPDATE summary_nodes SET staleness = MAX(staleness - ?2, 0) WHERE key = ?1",
            params![key, amount],
        )?;
        Ok(())
    }

    /// Nodes whose staleness exceeds `threshold`: most stale first, then
    /// least recently refreshed (never-refreshed nodes first), then key.
    pub fn candidates(conn: &Connection, threshold: u32, limit: usize) -> Result<Vec<SummaryNode>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM summary_nodes
             WHERE staleness > ?1
             ORDER BY staleness DESC, last_updated IS NOT NULL, last_updated ASC, key ASC
             LIMIT ?2"
        );
        query(conn, &sql, params![threshold, sql_limit(limit)])
    }

    /// Store a fresh summary and reset the node's staleness.
    pub fn set_summary(
        conn: &Connection,
        key: &str,
        summary: &str,
        embedding: Option<&Vec<f32>>,
        at: &DateTime<Utc>,
    ) -> Result<bool> {
        let n = conn.execute(
            "UPDATE summary_nodes
             SET summary = ?2, embedding = ?3, staleness = 0, last_updated = ?4
             WHERE key = ?1",
            params![key, summary, blob(embedding), to_db(at)],
        )?;
        Ok(n > 0)
    }

    /// Direct children of a node, by key.
    pub fn children(conn: &Connection, key: &str) -> Result<Vec<SummaryNode>> {
        let sql = format!("SELECT {COLUMNS} FROM summary_nodes WHERE parent_key = ?1 ORDER BY key ASC");
        query(conn, &sql, [key])
    }

    /// Delete a node (descendants cascade).
    pub fn delete(conn: &Connection, key: &str) -> Result<bool> {
        Ok(conn.execute("DELETE FROM summary_nodes WHERE key = ?1", [key])? > 0)
    }

    /// Every node, parents before children.
    pub fn all(conn: &Connection) -> Result<Vec<SummaryNode>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM summary_nodes
             ORDER BY CASE node_type WHEN 'root' THEN 0 WHEN 'entity' THEN 2 ELSE 1 END, key ASC"
        );
        query(conn, &sql, [])
    }

    /// Number of nodes.
    pub fn count(conn: &Connection) -> Result<u64> {
        count(conn, "SELECT COUNT(*) FROM summary_nodes")
    }
}

fn query(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<SummaryNode>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params, map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<SummaryNode> {
    Ok(SummaryNode {
        key: row.get(0)?,
        node_type: enum_col(row, 1, NodeType::parse)?,
        parent_key: row.get(2)?,
        summary: row.get(3)?,
        embedding: vec_col(row, 4)?,
        staleness: row.get(5)?,
        last_updated: opt_ts_col(row, 6)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
