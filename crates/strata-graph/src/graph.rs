//! `KnowledgeGraph`: pool-backed façade over resolution, upserts, topics and
//! views. Each event's extraction runs in one `SQLite` transaction, so a
//! cancelled or failed extraction never leaves a half-applied update.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use strata_core::text::normalize;
use strata_core::{
    Edge, Entity, EntityId, Event, Extraction, Fact, FactObject, FactType, Topic, TopicId,
};
use strata_settings::GraphSettings;
use strata_store::repositories::edge::EdgeRepo;
use strata_store::repositories::entity::EntityRepo;
use strata_store::repositories::fact::FactRepo;
use strata_store::repositories::topic::TopicRepo;
use strata_store::{ConnectionPool, PooledConnection};
use tracing::{debug, info};

use crate::errors::{GraphError, Result};
use crate::resolver::{self, Candidate, Resolution};
use crate::topics;
use crate::upsert::{self, EdgeInput, FactChange, FactInput, FactOutcome, normalize_label};
use crate::view::{self, EntityView};

/// Name embeddings for one extraction, keyed by normalised entity name.
pub type NameEmbeddings = HashMap<String, Vec<f32>>;

/// What applying one event's extraction changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppliedExtraction {
    /// Resolved entities, in extraction order.
    pub entities: Vec<Resolution>,
    /// Edges after upsert.
    pub edges: Vec<Edge>,
    /// Fact upsert outcomes.
    pub facts: Vec<FactOutcome>,
    /// Topics the event was linked to.
    pub topics: Vec<TopicId>,
}

impl AppliedExtraction {
    /// Whether any preference fact was created, strengthened or superseded.
    pub fn touches_preferences(&self) -> bool {
        self.facts.iter().any(|f| {
            f.fact.fact_type == FactType::Preference && f.change != FactChange::Unchanged
        })
    }
}

/// What forgetting an entity removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForgottenEntity {
    /// The deleted entity.
    pub entity_id: EntityId,
    /// Its type.
    pub entity_type: strata_core::EntityType,
    /// Edges removed with it.
    pub edges: u64,
    /// Facts removed with it (as subject or object).
    pub facts: usize,
}

/// The Knowledge Graph layer.
#[derive(Clone)]
pub struct KnowledgeGraph {
    pool: ConnectionPool,
    settings: GraphSettings,
}

impl KnowledgeGraph {
    /// Create a graph over the shared pool.
    pub fn new(pool: ConnectionPool, settings: GraphSettings) -> Self {
        Self { pool, settings }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get().map_err(strata_store::StoreError::from)?)
    }

    /// Run `f` inside one transaction.
    fn atomic<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Apply one event's extraction: entities first, then edges, then facts
    /// that reference them, then topics. The whole event commits in one
    /// transaction, so a failure part-way leaves the graph untouched.
    pub fn apply_extraction(
        &self,
        event: &Event,
        extraction: &Extraction,
        embeddings: &NameEmbeddings,
    ) -> Result<AppliedExtraction> {
        extraction
            .validate()
            .map_err(|e| GraphError::Invalid(e.to_string()))?;
        let applied = self.atomic(|conn| self.apply_in(conn, event, extraction, embeddings))?;
        debug!(
            event_id = %event.id,
            entities = applied.entities.len(),
            edges = applied.edges.len(),
            facts = applied.facts.len(),
            topics = applied.topics.len(),
            "extraction applied"
        );
        Ok(applied)
    }

    fn apply_in(
        &self,
        conn: &Connection,
        event: &Event,
        extraction: &Extraction,
        embeddings: &NameEmbeddings,
    ) -> Result<AppliedExtraction> {
        let at = event.timestamp;
        let settings = &self.settings;
        let mut applied = AppliedExtraction::default();
        let mut ids: HashMap<String, EntityId> = HashMap::new();

        for extracted in &extraction.entities {
            let key = normalize(&extracted.name);
            let candidate = Candidate {
                name: &extracted.name,
                entity_type: extracted.entity_type,
                description: &extracted.description,
                embedding: embeddings.get(&key).map(Vec::as_slice),
            };
            let resolution = resolver::resolve(conn, &candidate, &event.id, &at, settings)?;
            let _ = ids.insert(key, resolution.entity_id.clone());
            applied.entities.push(resolution);
        }

        let lookup = |name: &str| {
            ids.get(&normalize(name))
                .ok_or_else(|| GraphError::Invalid(format!("unknown entity '{name}'")))
        };

        for edge in &extraction.edges {
            let input = EdgeInput {
                source: lookup(&edge.source)?,
                target: lookup(&edge.target)?,
                relation: &edge.relation,
                category: edge.category.as_deref(),
            };
            applied.edges.push(upsert::upsert_edge(conn, &input, &event.id, &at, settings)?);
        }

        for fact in &extraction.facts {
            let object = if fact.object_is_entity {
                FactObject::Entity(lookup(&fact.object)?.clone())
            } else {
                FactObject::Literal(fact.object.clone())
            };
            let input = FactInput {
                subject: lookup(&fact.subject)?,
                predicate: &fact.predicate,
                object,
                fact_type: fact.fact_type,
                confidence: fact.confidence,
                exclusive: fact.exclusive,
            };
            applied.facts.push(upsert::upsert_fact(conn, &input, &event.id, &at, settings)?);
        }

        for label in &extraction.topics {
            if normalize(label).is_empty() {
                continue;
            }
            let topic =
                topics::assign_topic(conn, label, &event.id, event.embedding.as_deref(), &at, settings)?;
            if !applied.topics.contains(&topic) {
                applied.topics.push(topic);
            }
        }
        Ok(applied)
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Entity with relations and active facts, by any alias.
    pub fn get_entity(&self, name: &str) -> Result<Option<EntityView>> {
        let conn = self.conn()?;
        view::entity_view(&conn, name)
    }

    /// Every version of `subject predicate`, oldest first.
    pub fn fact_history(&self, subject: &str, predicate: &str) -> Result<Vec<Fact>> {
        let conn = self.conn()?;
        let Some(entity) = EntityRepo::find_by_alias(&conn, subject)? else {
            return Ok(Vec::new());
        };
        Ok(FactRepo::history(&conn, &entity.id, &normalize_label(predicate))?)
    }

    /// Most-mentioned entities.
    pub fn top_entities(&self, limit: usize) -> Result<Vec<Entity>> {
        let conn = self.conn()?;
        Ok(EntityRepo::top(&conn, limit)?)
    }

    /// Largest topics.
    pub fn top_topics(&self, limit: usize) -> Result<Vec<Topic>> {
        let conn = self.conn()?;
        Ok(TopicRepo::top(&conn, limit)?)
    }

    /// Active preference facts rendered as text, strongest first.
    pub fn preferences(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn()?;
        FactRepo::active_of_type(&conn, FactType::Preference, limit)?
            .iter()
            .map(|f| view::render_fact(&conn, f))
            .collect()
    }

    /// Active non-preference facts rendered as text, strongest first.
    pub fn knowledge_facts(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn()?;
        FactRepo::active_top(&conn, FactType::Preference, limit)?
            .iter()
            .map(|f| view::render_fact(&conn, f))
            .collect()
    }

    // ── Forget ──────────────────────────────────────────────────────────

    /// Delete an entity with its aliases, edges and facts (subject or
    /// object). Returns `None` when no alias matches.
    pub fn forget_entity(&self, name: &str) -> Result<Option<ForgottenEntity>> {
        self.atomic(|conn| {
            let Some(entity) = EntityRepo::find_by_alias(conn, name)? else {
                return Ok(None);
            };
            let edges = EdgeRepo::count_for_entity(conn, &entity.id)?;
            let facts = FactRepo::delete_for_entity(conn, &entity.id)?;
            let _ = EntityRepo::delete(conn, &entity.id)?;
            info!(entity_id = %entity.id, name = %entity.name, edges, facts, "entity forgotten");
            Ok(Some(ForgottenEntity {
                entity_id: entity.id,
                entity_type: entity.entity_type,
                edges,
                facts,
            }))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
