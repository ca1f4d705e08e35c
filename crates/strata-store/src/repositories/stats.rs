//! Aggregate counts across every table.

use rusqlite::Connection;
use serde::Serialize;

use super::count;
use super::event::{EventRepo, StatusCounts};
use crate::errors::Result;

/// Row counts for the whole memory database.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Events per extraction status.
    pub events: StatusCounts,
    /// Entities.
    pub entities: u64,
    /// Edges.
    pub edges: u64,
    /// Active facts.
    pub active_facts: u64,
    /// Superseded facts.
    pub superseded_facts: u64,
    /// Topics.
    pub topics: u64,
    /// Summary nodes.
    pub summary_nodes: u64,
    /// Summary nodes with pending staleness.
    pub stale_nodes: u64,
    /// Active learnings.
    pub active_learnings: u64,
}

/// Stats repository.
pub struct StatsRepo;

impl StatsRepo {
    /// Collect every count in one pass.
    pub fn collect(conn: &Connection) -> Result<MemoryStats> {
        let active_facts = count(conn, "SELECT COUNT(*) FROM facts WHERE superseded_by IS NULL")?;
        Ok(MemoryStats {
            events: EventRepo::count_by_status(conn)?,
            entities: count(conn, "SELECT COUNT(*) FROM entities")?,
            edges: count(conn, "SELECT COUNT(*) FROM edges")?,
            active_facts,
            superseded_facts: count(conn, "SELECT COUNT(*) FROM facts")?
                .saturating_sub(active_facts),
            topics: count(conn, "SELECT COUNT(*) FROM topics")?,
            summary_nodes: count(conn, "SELECT COUNT(*) FROM summary_nodes")?,
            stale_nodes: count(conn, "SELECT COUNT(*) FROM summary_nodes WHERE staleness > 0")?,
            active_learnings: count(
                conn,
                "SELECT COUNT(*) FROM learnings WHERE superseded_by IS NULL",
            )?,
        })
    }
}
