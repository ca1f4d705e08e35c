//! Entity resolution.
//!
//! A candidate name is resolved in three steps, cheapest first:
//!
//! 1. **Exact alias**: the normalised name is already an alias of an entity
//!    of the same type (or its canonical name).
//! 2. **Embedding merge**: the candidate's embedding is at least
//!    `entity_merge_threshold` similar to the name embedding of an existing
//!    entity of the same type. Highest similarity wins, ties go to the most
//!    recently seen entity. The name becomes a new alias.
//! 3. **Create**: anything below the threshold becomes a new entity. An
//!    ambiguous merge is never attempted.
//!
//! Every successful resolution counts a mention for the contributing event,
//! at most once per event.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use strata_core::text::normalize;
use strata_core::{Entity, EntityId, EntityType, EventId};
use strata_embeddings::best_match;
use strata_settings::GraphSettings;
use strata_store::repositories::entity::EntityRepo;
use tracing::debug;

use crate::errors::{GraphError, Result};

/// How a candidate was resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResolutionKind {
    /// Exact alias or canonical-name hit.
    Exact,
    /// Merged by embedding similarity.
    Merged {
        /// Cosine similarity of the winning match.
        similarity: f64,
    },
    /// A new entity was created.
    Created,
}

/// Outcome of resolving one candidate name.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// The canonical entity.
    pub entity_id: EntityId,
    /// Its type.
    pub entity_type: EntityType,
    /// Which step matched.
    pub kind: ResolutionKind,
}

/// Input for [`resolve`].
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    /// Surface name as written.
    pub name: &'a str,
    /// Entity type.
    pub entity_type: EntityType,
    /// Optional description from the extractor.
    pub description: &'a str,
    /// Name embedding, when the backend produced one.
    pub embedding: Option<&'a [f32]>,
}

/// Resolve a candidate to a canonical entity, creating one if needed.
pub fn resolve(
    conn: &Connection,
    candidate: &Candidate<'_>,
    event_id: &EventId,
    at: &DateTime<Utc>,
    settings: &GraphSettings,
) -> Result<Resolution> {
    let name = candidate.name.trim();
    if normalize(name).is_empty() {
        return Err(GraphError::Invalid(format!("unusable entity name '{}'", candidate.name)));
    }

    if let Some(existing) = exact(conn, name, candidate.entity_type)? {
        let _ = EntityRepo::record_mention(conn, &existing, event_id, at)?;
        EntityRepo::fill_description(conn, &existing, candidate.description)?;
        return Ok(Resolution {
            entity_id: existing,
            entity_type: candidate.entity_type,
            kind: ResolutionKind::Exact,
        });
    }

    if let Some(embedding) = candidate.embedding {
        let pool = EntityRepo::embeddings_of_type(conn, candidate.entity_type)?;
        let best = best_match(
            embedding,
            pool.into_iter().map(|(id, seen, v)| ((id, seen), v)),
            settings.entity_merge_threshold,
            |(_, seen)| *seen,
        );
        if let Some(m) = best {
            let (entity_id, _) = m.item;
            let _ = EntityRepo::add_alias(conn, &entity_id, name)?;
            let _ = EntityRepo::record_mention(conn, &entity_id, event_id, at)?;
            EntityRepo::fill_description(conn, &entity_id, candidate.description)?;
            debug!(entity_id = %entity_id, alias = name, similarity = m.similarity, "entity merged");
            return Ok(Resolution {
                entity_id,
                entity_type: candidate.entity_type,
                kind: ResolutionKind::Merged { similarity: m.similarity },
            });
        }
    }

    let entity = Entity {
        id: EntityId::new(),
        name: name.to_string(),
        entity_type: candidate.entity_type,
        aliases: Vec::new(),
        description: candidate.description.trim().to_string(),
        name_embedding: candidate.embedding.map(<[f32]>::to_vec),
        event_ids: vec![event_id.clone()],
        mention_count: 1,
        first_seen: *at,
        last_seen: *at,
    };
    EntityRepo::insert(conn, &entity)?;
    debug!(entity_id = %entity.id, name, entity_type = %entity.entity_type, "entity created");
    Ok(Resolution {
        entity_id: entity.id,
        entity_type: candidate.entity_type,
        kind: ResolutionKind::Created,
    })
}

/// Alias hit of the right type, else canonical name + type.
fn exact(conn: &Connection, name: &str, entity_type: EntityType) -> Result<Option<EntityId>> {
    if let Some(e) = EntityRepo::find_by_alias(conn, name)? {
        if e.entity_type == entity_type {
            return Ok(Some(e.id));
        }
    }
    Ok(EntityRepo::find_by_name(conn, name, entity_type)?.map(|e| e.id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
