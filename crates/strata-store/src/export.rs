//! Whole-database export and import.
//!
//! An export is a versioned JSON document holding every table. Import runs
//! in one transaction and is additive: rows whose ID already exists are
//! skipped, as are rows that reference something that is not present after
//! the skip (an edge whose entity collided on name, a child node whose
//! parent is missing).

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use strata_core::{
    Edge, Entity, Event, EventId, Fact, FactObject, Learning, NodeType, SummaryNode, Topic, TopicId,
};
use tracing::info;

use crate::errors::{Result, StoreError};
use crate::repositories::edge::EdgeRepo;
use crate::repositories::entity::EntityRepo;
use crate::repositories::event::EventRepo;
use crate::repositories::fact::FactRepo;
use crate::repositories::learning::LearningRepo;
use crate::repositories::summary::SummaryRepo;
use crate::repositories::topic::TopicRepo;

/// Current export format version.
pub const EXPORT_VERSION: u32 = 1;

/// An event together with its undecayed relevance base.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedEvent {
    /// The event.
    #[serde(flatten)]
    pub event: Event,
    /// Decay-engine base score.
    pub relevance_base: f64,
}

/// A `(event, topic)` membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicLink {
    /// Event ID.
    pub event_id: EventId,
    /// Topic ID.
    pub topic_id: TopicId,
}

/// Snapshot of every table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryExport {
    /// Format version.
    pub version: u32,
    /// When the snapshot was taken.
    pub exported_at: DateTime<Utc>,
    /// Events in append order.
    pub events: Vec<ExportedEvent>,
    /// Entities.
    pub entities: Vec<Entity>,
    /// Edges.
    pub edges: Vec<Edge>,
    /// Facts, superseded ones included.
    pub facts: Vec<Fact>,
    /// Topics.
    pub topics: Vec<Topic>,
    /// Event-topic links.
    pub topic_links: Vec<TopicLink>,
    /// Summary nodes, parents before children.
    pub summary_nodes: Vec<SummaryNode>,
    /// Learnings, superseded ones included.
    pub learnings: Vec<Learning>,
}

/// What an import wrote and what it skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows inserted, all tables together.
    pub inserted: u64,
    /// Rows skipped because they already existed or lost a reference.
    pub skipped: u64,
}

impl ImportReport {
    fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.skipped += 1;
        }
    }
}

/// Read every table into a [`MemoryExport`].
pub fn export_all(conn: &Connection) -> Result<MemoryExport> {
    let tx = conn.unchecked_transaction()?;
    let export = MemoryExport {
        version: EXPORT_VERSION,
        exported_at: Utc::now(),
        events: EventRepo::all_with_base(&tx)?
            .into_iter()
            .map(|(event, relevance_base)| ExportedEvent { event, relevance_base })
            .collect(),
        entities: EntityRepo::all(&tx)?,
        edges: EdgeRepo::all(&tx)?,
        facts: FactRepo::all(&tx)?,
        topics: TopicRepo::all(&tx)?,
        topic_links: TopicRepo::all_links(&tx)?
            .into_iter()
            .map(|(event_id, topic_id)| TopicLink { event_id, topic_id })
            .collect(),
        summary_nodes: SummaryRepo::all(&tx)?,
        learnings: LearningRepo::all(&tx)?,
    };
    tx.commit()?;
    Ok(export)
}

/// Load an export into the store inside a single transaction.
pub fn import_all(conn: &Connection, export: &MemoryExport) -> Result<ImportReport> {
    if export.version != EXPORT_VERSION {
        return Err(StoreError::UnsupportedExport {
            found: export.version,
            expected: EXPORT_VERSION,
        });
    }

    let tx = conn.unchecked_transaction()?;
    let mut report = ImportReport::default();

    let mut events: Vec<&ExportedEvent> = export.events.iter().collect();
    events.sort_by_key(|e| e.event.sequence);
    for exported in events {
        exported.event.metadata.validate()?;
        let fresh = !EventRepo::exists(&tx, &exported.event.id)?;
        if fresh {
            let _ = EventRepo::insert(&tx, &exported.event, exported.relevance_base)?;
        }
        report.record(fresh);
    }

    for entity in &export.entities {
        let fresh = EntityRepo::get(&tx, &entity.id)?.is_none()
            && EntityRepo::find_by_name(&tx, &entity.name, entity.entity_type)?.is_none();
        if fresh {
            EntityRepo::insert(&tx, entity)?;
        }
        report.record(fresh);
    }

    for edge in &export.edges {
        let fresh = EdgeRepo::get(&tx, &edge.id)?.is_none()
            && EdgeRepo::find(&tx, &edge.source_id, &edge.target_id, &edge.relation)?.is_none()
            && entity_exists(&tx, &edge.source_id)?
            && entity_exists(&tx, &edge.target_id)?;
        if fresh {
            EdgeRepo::insert(&tx, edge)?;
        }
        report.record(fresh);
    }

    for fact in &export.facts {
        let object_ok = match &fact.object {
            FactObject::Entity(id) => entity_exists(&tx, id)?,
            FactObject::Literal(_) => true,
        };
        let collides = fact.is_active()
            && fact.exclusive
            && FactRepo::active_for(&tx, &fact.subject_id, &fact.predicate)?
                .iter()
                .any(|f| f.exclusive);
        let fresh = FactRepo::get(&tx, &fact.id)?.is_none()
            && entity_exists(&tx, &fact.subject_id)?
            && object_ok
            && !collides;
        if fresh {
            FactRepo::insert(&tx, fact)?;
        }
        report.record(fresh);
    }

    for topic in &export.topics {
        let fresh = TopicRepo::get(&tx, &topic.id)?.is_none()
            && TopicRepo::find_by_label(&tx, &topic.label)?.is_none();
        if fresh {
            TopicRepo::insert(&tx, topic)?;
        }
        report.record(fresh);
    }

    for link in &export.topic_links {
        let fresh = EventRepo::exists(&tx, &link.event_id)?
            && TopicRepo::get(&tx, &link.topic_id)?.is_some()
            && TopicRepo::insert_link(&tx, &link.event_id, &link.topic_id)?;
        report.record(fresh);
    }
    TopicRepo::recount(&tx)?;

    for node in &export.summary_nodes {
        let parent_ok = match &node.parent_key {
            Some(parent) => {
                node.node_type != NodeType::Root && SummaryRepo::get(&tx, parent)?.is_some()
            }
            None => node.node_type == NodeType::Root,
        };
        let fresh = parent_ok && SummaryRepo::insert(&tx, node)?;
        report.record(fresh);
    }

    for learning in &export.learnings {
        report.record(LearningRepo::insert(&tx, learning)?);
    }

    tx.commit()?;
    info!(inserted = report.inserted, skipped = report.skipped, "memory import complete");
    Ok(report)
}

fn entity_exists(conn: &Connection, id: &str) -> Result<bool> {
    Ok(EntityRepo::name_of(conn, id)?.is_some())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
