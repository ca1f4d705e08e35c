//! Ranked search over events, entities and facts.
//!
//! Each candidate gets a match signal: cosine similarity to the query
//! embedding (when both sides have one) or a fixed score for a
//! case-insensitive substring hit, whichever is higher. Event signals are
//! then weighted by the event's relevance score.

use rusqlite::Connection;
use serde::Serialize;
use strata_embeddings::cosine_similarity;
use strata_graph::view::render_fact;
use strata_store::repositories::entity::EntityRepo;
use strata_store::repositories::event::EventRepo;
use strata_store::repositories::fact::FactRepo;

use crate::errors::Result;

/// Events considered per search, highest relevance first.
pub const EVENT_POOL: usize = 500;

/// Cosine similarity below which an embedding match is ignored.
pub const MIN_SIMILARITY: f64 = 0.3;

/// Signal of a substring hit.
pub const SUBSTRING_SCORE: f64 = 0.75;

/// What a hit refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    /// A logged event.
    Event,
    /// A resolved entity.
    Entity,
    /// An active fact.
    Fact,
}

/// One search result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    /// Kind of record.
    pub kind: HitKind,
    /// Record ID.
    pub id: String,
    /// Display text.
    pub text: String,
    /// Ranking score in `[0, 1]`.
    pub score: f64,
}

/// Rank every candidate against `query` and keep the best `limit`.
pub fn search(
    conn: &Connection,
    query: &str,
    embedding: Option<&[f32]>,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() && embedding.is_none() {
        return Ok(Vec::new());
    }
    let signal = |text: &str, vector: Option<&[f32]>| -> f64 {
        let semantic = match (embedding, vector) {
            (Some(q), Some(v)) => cosine_similarity(q, v),
            _ => 0.0,
        };
        let semantic = if semantic >= MIN_SIMILARITY { semantic } else { 0.0 };
        let literal = if !needle.is_empty() && text.to_lowercase().contains(&needle) {
            SUBSTRING_SCORE
        } else {
            0.0
        };
        semantic.max(literal)
    };

    let mut hits = Vec::new();
    for event in EventRepo::search_candidates(conn, EVENT_POOL)? {
        if event.content.trim().is_empty() {
            continue;
        }
        let s = signal(&event.content, event.embedding.as_deref());
        if s > 0.0 {
            hits.push(SearchHit {
                kind: HitKind::Event,
                id: event.id.to_string(),
                score: s * (0.5 + 0.5 * event.relevance_score),
                text: event.content,
            });
        }
    }
    for entity in EntityRepo::all(conn)? {
        let haystack = entity.aliases.join(" ");
        let s = signal(&format!("{} {haystack}", entity.name), entity.name_embedding.as_deref());
        if s > 0.0 {
            hits.push(SearchHit {
                kind: HitKind::Entity,
                id: entity.id.to_string(),
                text: format!("{} ({})", entity.name, entity.entity_type),
                score: s,
            });
        }
    }
    for fact in FactRepo::all(conn)?.into_iter().filter(|f| f.is_active()) {
        let text = render_fact(conn, &fact)?;
        let s = signal(&text, None);
        if s > 0.0 {
            hits.push(SearchHit { kind: HitKind::Fact, id: fact.id.to_string(), text, score: s });
        }
    }

    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(limit);
    Ok(hits)
}
