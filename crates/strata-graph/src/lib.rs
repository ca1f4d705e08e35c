//! # strata-graph
//!
//! Knowledge Graph layer of the Strata memory subsystem.
//!
//! Turns extraction output into durable, deduplicated knowledge:
//!
//! - [`resolver`]: candidate names to canonical entities (alias, embedding
//!   merge, or create)
//! - [`upsert`]: edges that strengthen on re-mention and facts that
//!   strengthen or supersede
//! - [`topics`]: label and centroid based topic clustering
//! - [`view`]: entity views and fact rendering for the read path
//! - [`KnowledgeGraph`]: pool-backed façade, one transaction per extracted event
//!
//! Every write is idempotent per contributing event, so a retried
//! extraction never double-counts.

#![deny(unsafe_code)]

pub mod errors;
pub mod graph;
pub mod resolver;
pub mod topics;
pub mod upsert;
pub mod view;

pub use errors::{GraphError, Result};
pub use graph::{AppliedExtraction, ForgottenEntity, KnowledgeGraph, NameEmbeddings};
pub use resolver::{Candidate, Resolution, ResolutionKind};
pub use upsert::{
    DEFAULT_CATEGORY, EdgeInput, FactChange, FactInput, FactOutcome, normalize_label,
};
pub use view::{EntityView, FactView, Relation};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use rusqlite::Connection;
    use strata_core::{Entity, EntityId, EntityType, EventId};
    use strata_store::migrations::run_migrations;
    use strata_store::repositories::entity::EntityRepo;

    pub(crate) fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    /// Insert a concept entity (canonical name doubles as alias).
    pub(crate) fn entity(conn: &Connection, name: &str) -> EntityId {
        let now = Utc::now();
        let e = Entity {
            id: EntityId::new(),
            name: name.into(),
            entity_type: EntityType::Concept,
            aliases: vec![],
            description: String::new(),
            name_embedding: None,
            event_ids: vec![],
            mention_count: 1,
            first_seen: now,
            last_seen: now,
        };
        EntityRepo::insert(conn, &e).unwrap();
        e.id
    }

    /// Insert a bare event row.
    pub(crate) fn event(conn: &Connection, id: &str) -> EventId {
        let _ = conn
            .execute(
                "INSERT INTO events (id, timestamp, channel, direction, kind, content, session_key, checksum)
                 VALUES (?1, '2026-01-01T00:00:00.000Z', 'cli', 'inbound', 'message', 'x', 's', '')",
                [id],
            )
            .unwrap();
        EventId::from(id)
    }
}
