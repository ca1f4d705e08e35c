//! Edge and fact upserts.
//!
//! Re-mentions strengthen existing records instead of duplicating them.
//! A re-delivery of the same event is a no-op, so retried extractions do
//! not inflate strengths.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use strata_core::text::{literals_match, normalize};
use strata_core::{Edge, EdgeId, EntityId, EventId, Fact, FactId, FactObject, FactType};
use strata_settings::GraphSettings;
use strata_store::repositories::edge::EdgeRepo;
use strata_store::repositories::fact::FactRepo;
use tracing::{debug, info};

use crate::errors::{GraphError, Result};

/// Category used when the extractor does not supply one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Normalise a relation or predicate label: lowercase words joined by `_`.
pub fn normalize_label(label: &str) -> String {
    normalize(label).replace(' ', "_")
}

// ─────────────────────────────────────────────────────────────────────────────
// Edges
// ─────────────────────────────────────────────────────────────────────────────

/// Input for [`upsert_edge`].
#[derive(Clone, Copy, Debug)]
pub struct EdgeInput<'a> {
    /// Source entity.
    pub source: &'a EntityId,
    /// Target entity.
    pub target: &'a EntityId,
    /// Relation label (normalised on write).
    pub relation: &'a str,
    /// Relation category.
    pub category: Option<&'a str>,
}

/// Create an edge at the initial strength, or step an existing one's
/// strength up (saturating at 1.0) and link the event.
pub fn upsert_edge(
    conn: &Connection,
    input: &EdgeInput<'_>,
    event_id: &EventId,
    at: &DateTime<Utc>,
    settings: &GraphSettings,
) -> Result<Edge> {
    let relation = normalize_label(input.relation);
    if relation.is_empty() {
        return Err(GraphError::Invalid(format!("unusable relation '{}'", input.relation)));
    }

    if let Some(existing) = EdgeRepo::find(conn, input.source, input.target, &relation)? {
        if EdgeRepo::link_event(conn, &existing.id, event_id)? {
            let strength = (existing.strength + settings.edge_strength_step).min(1.0);
            EdgeRepo::reinforce(conn, &existing.id, strength, at)?;
            debug!(edge_id = %existing.id, relation, strength, "edge reinforced");
        }
        return reload_edge(conn, &existing.id);
    }

    let category = input
        .category
        .map(normalize_label)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let edge = Edge {
        id: EdgeId::new(),
        source_id: input.source.clone(),
        target_id: input.target.clone(),
        relation,
        category,
        strength: settings.edge_initial_strength.clamp(0.0, 1.0),
        event_ids: vec![event_id.clone()],
        first_seen: *at,
        last_seen: *at,
    };
    EdgeRepo::insert(conn, &edge)?;
    debug!(edge_id = %edge.id, relation = %edge.relation, "edge created");
    Ok(edge)
}

fn reload_edge(conn: &Connection, id: &str) -> Result<Edge> {
    EdgeRepo::get(conn, id)?.ok_or_else(|| {
        GraphError::Store(strata_store::StoreError::NotFound {
            kind: "edge",
            id: id.to_string(),
        })
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Facts
// ─────────────────────────────────────────────────────────────────────────────

/// Input for [`upsert_fact`].
#[derive(Clone, Debug)]
pub struct FactInput<'a> {
    /// Subject entity.
    pub subject: &'a EntityId,
    /// Predicate (normalised on write).
    pub predicate: &'a str,
    /// Object.
    pub object: FactObject,
    /// Fact type.
    pub fact_type: FactType,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether a different object supersedes the current one.
    pub exclusive: bool,
}

/// What an upsert did to the fact table.
#[derive(Clone, Debug, PartialEq)]
pub enum FactChange {
    /// A new active fact.
    Created,
    /// The matching active fact was re-asserted.
    Strengthened,
    /// The event was already counted for this fact.
    Unchanged,
    /// The prior active fact was closed and replaced.
    Superseded {
        /// The fact that is no longer active.
        previous: FactId,
    },
}

/// Result of [`upsert_fact`].
#[derive(Clone, Debug, PartialEq)]
pub struct FactOutcome {
    /// The active fact after the upsert.
    pub fact: Fact,
    /// What happened.
    pub change: FactChange,
}

/// Upsert a fact.
///
/// * an active fact with a matching object is strengthened and its
///   confidence merged;
/// * an active exclusive fact with a different object is superseded by a
///   new active fact (never overwritten);
/// * otherwise a new active fact is created.
///
/// Literal objects match when their numbers agree and their normalised
/// similarity reaches `fact_similarity_threshold`; entity objects match by ID.
pub fn upsert_fact(
    conn: &Connection,
    input: &FactInput<'_>,
    event_id: &EventId,
    at: &DateTime<Utc>,
    settings: &GraphSettings,
) -> Result<FactOutcome> {
    let predicate = normalize_label(input.predicate);
    if predicate.is_empty() {
        return Err(GraphError::Invalid(format!("unusable predicate '{}'", input.predicate)));
    }
    if let FactObject::Literal(text) = &input.object {
        if text.trim().is_empty() {
            return Err(GraphError::Invalid(format!("empty object for '{predicate}'")));
        }
    }
    let confidence = input.confidence.clamp(0.0, 1.0);
    let active = FactRepo::active_for(conn, input.subject, &predicate)?;

    if let Some(same) = active
        .iter()
        .find(|f| objects_match(&f.object, &input.object, settings.fact_similarity_threshold))
    {
        if same.event_ids.contains(event_id) {
            return Ok(FactOutcome {
                fact: same.clone(),
                change: FactChange::Unchanged,
            });
        }
        let merged = merge_confidence(same.confidence, confidence);
        FactRepo::strengthen(conn, &same.id, merged, at)?;
        FactRepo::link_event(conn, &same.id, event_id)?;
        debug!(fact_id = %same.id, predicate, confidence = merged, "fact strengthened");
        return Ok(FactOutcome {
            fact: reload_fact(conn, &same.id)?,
            change: FactChange::Strengthened,
        });
    }

    let fact = Fact {
        id: FactId::new(),
        subject_id: input.subject.clone(),
        predicate: predicate.clone(),
        object: normalize_object(&input.object),
        fact_type: input.fact_type,
        confidence,
        strength: 1,
        exclusive: input.exclusive,
        event_ids: vec![event_id.clone()],
        valid_from: *at,
        valid_to: None,
        superseded_by: None,
        created_at: *at,
        updated_at: *at,
    };

    let previous = if input.exclusive {
        active.iter().find(|f| f.exclusive).map(|f| f.id.clone())
    } else {
        None
    };
    if let Some(previous) = &previous {
        // close the old fact first: the one-active index is checked per statement
        let _ = FactRepo::supersede(conn, previous, &fact.id, at)?;
    }
    FactRepo::insert(conn, &fact)?;

    let change = match previous {
        Some(previous) => {
            info!(
                subject_id = %fact.subject_id,
                predicate,
                previous = %previous,
                current = %fact.id,
                "fact superseded"
            );
            FactChange::Superseded { previous }
        }
        None => {
            debug!(fact_id = %fact.id, predicate, "fact created");
            FactChange::Created
        }
    };
    Ok(FactOutcome { fact, change })
}

/// Merge an existing confidence with a re-assertion: the newer value counts
/// twice and the higher of the two once more.
pub fn merge_confidence(existing: f64, incoming: f64) -> f64 {
    ((existing + 2.0 * incoming + existing.max(incoming)) / 4.0).clamp(0.0, 1.0)
}

fn objects_match(a: &FactObject, b: &FactObject, threshold: f64) -> bool {
    match (a, b) {
        (FactObject::Entity(x), FactObject::Entity(y)) => x == y,
        (FactObject::Literal(x), FactObject::Literal(y)) => literals_match(x, y, threshold),
        _ => false,
    }
}

fn normalize_object(object: &FactObject) -> FactObject {
    match object {
        FactObject::Literal(text) => FactObject::Literal(text.trim().to_string()),
        FactObject::Entity(id) => FactObject::Entity(id.clone()),
    }
}

fn reload_fact(conn: &Connection, id: &str) -> Result<Fact> {
    FactRepo::get(conn, id)?.ok_or_else(|| {
        GraphError::Store(strata_store::StoreError::NotFound {
            kind: "fact",
            id: id.to_string(),
        })
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
