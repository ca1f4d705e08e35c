//! # Memory Backend
//!
//! Capability interface for the external collaborators the memory core
//! consumes: entity/relation extraction, text embedding, and summarisation.
//! The scheduler is generic over [`MemoryBackend`] and never inlines model
//! logic. Implementations may be slow on first call; callers bound every
//! call with a timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::graph::{EntityType, FactType};
use crate::summary::NodeType;
use crate::text::normalize;

/// Errors returned by a [`MemoryBackend`].
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The call did not finish in time.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// Operation name (`extract`, `embed`, `summarize`).
        operation: &'static str,
        /// Elapsed budget.
        after_ms: u64,
    },

    /// The collaborator returned structurally invalid output.
    #[error("malformed output: {0}")]
    Malformed(String),

    /// The collaborator is not available (not loaded, offline).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Entity mentioned in an event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Surface name as written.
    pub name: String,
    /// Entity type.
    pub entity_type: EntityType,
    /// Optional description.
    #[serde(default)]
    pub description: String,
}

/// Directed relation between two extracted entities (by surface name).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEdge {
    /// Source entity name.
    pub source: String,
    /// Target entity name.
    pub target: String,
    /// Relation label.
    pub relation: String,
    /// Relation category; defaults to `general`.
    #[serde(default)]
    pub category: Option<String>,
}

/// Subject-predicate-object assertion (subject by surface name).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// Subject entity name.
    pub subject: String,
    /// Predicate.
    pub predicate: String,
    /// Object: literal text, or an entity name when `object_is_entity`.
    pub object: String,
    /// Whether `object` names an extracted entity.
    #[serde(default)]
    pub object_is_entity: bool,
    /// Fact type.
    pub fact_type: FactType,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// One active value per subject+predicate.
    #[serde(default = "default_exclusive")]
    pub exclusive: bool,
}

fn default_exclusive() -> bool {
    true
}

/// Output of a single `extract` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Entities.
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    /// Edges referencing entities by name.
    #[serde(default)]
    pub edges: Vec<ExtractedEdge>,
    /// Facts referencing entities by name.
    #[serde(default)]
    pub facts: Vec<ExtractedFact>,
    /// Topic labels.
    #[serde(default)]
    pub topics: Vec<String>,
}

impl Extraction {
    /// Whether nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.edges.is_empty()
            && self.facts.is_empty()
            && self.topics.is_empty()
    }

    /// Structural validation, using the same [`normalize`] rule the graph
    /// applies. Entity names, relations and predicates must not normalise to
    /// nothing, edges and facts must reference listed entities, literal
    /// objects must be non-blank and confidence must be a finite value in
    /// `[0, 1]`.
    pub fn validate(&self) -> BackendResult<()> {
        let names: Vec<String> = self.entities.iter().map(|e| normalize(&e.name)).collect();
        let known = |name: &str| {
            let key = normalize(name);
            !key.is_empty() && names.contains(&key)
        };
        for (entity, key) in self.entities.iter().zip(&names) {
            if key.is_empty() {
                return Err(BackendError::Malformed(format!(
                    "unusable entity name '{}'",
                    entity.name
                )));
            }
        }
        for edge in &self.edges {
            if normalize(&edge.relation).is_empty() {
                return Err(BackendError::Malformed("edge with empty relation".into()));
            }
            for end in [&edge.source, &edge.target] {
                if !known(end) {
                    return Err(BackendError::Malformed(format!(
                        "edge references unknown entity '{end}'"
                    )));
                }
            }
        }
        for fact in &self.facts {
            if normalize(&fact.predicate).is_empty() {
                return Err(BackendError::Malformed("fact with empty predicate".into()));
            }
            if !fact.object_is_entity && fact.object.trim().is_empty() {
                return Err(BackendError::Malformed("fact with empty object".into()));
            }
            if !known(&fact.subject) {
                return Err(BackendError::Malformed(format!(
                    "fact references unknown subject '{}'",
                    fact.subject
                )));
            }
            if fact.object_is_entity && !known(&fact.object) {
                return Err(BackendError::Malformed(format!(
                    "fact references unknown object '{}'",
                    fact.object
                )));
            }
            if !fact.confidence.is_finite() || !(0.0..=1.0).contains(&fact.confidence) {
                return Err(BackendError::Malformed(format!(
                    "fact confidence {} out of range",
                    fact.confidence
                )));
            }
        }
        Ok(())
    }
}

/// Scoped input for a `summarize` call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryScope {
    /// Node being refreshed.
    pub node_key: String,
    /// Node type.
    pub node_type: NodeType,
    /// Current summary text (may be empty).
    pub previous_summary: String,
    /// Scoped material: event contents, fact renderings, child summaries.
    pub items: Vec<String>,
}

/// External extraction / embedding / summarisation capabilities.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Extract entities, edges, facts and topics from event content.
    /// Must be idempotent per input.
    async fn extract(&self, content: &str) -> BackendResult<Extraction>;

    /// Embed text into a fixed-width vector.
    async fn embed(&self, text: &str) -> BackendResult<Vec<f32>>;

    /// Produce a summary for the given scope.
    async fn summarize(&self, scope: &SummaryScope) -> BackendResult<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn entity(name: &str) -> ExtractedEntity {
        ExtractedEntity {
            name: name.into(),
            entity_type: EntityType::Org,
            description: String::new(),
        }
    }

    fn fact(subject: &str, confidence: f64) -> ExtractedFact {
        ExtractedFact {
            subject: subject.into(),
            predicate: "prefers".into(),
            object: "short emails".into(),
            object_is_entity: false,
            fact_type: FactType::Preference,
            confidence,
            exclusive: true,
        }
    }

    #[test]
    fn valid_extraction_passes() {
        let ex = Extraction {
            entities: vec![entity("User"), entity("Acme")],
            edges: vec![ExtractedEdge {
                source: "user".into(),
                target: "Acme".into(),
                relation: "works_at".into(),
                category: None,
            }],
            facts: vec![fact("User", 0.9)],
            topics: vec![],
        };
        assert!(ex.validate().is_ok());
    }

    #[test]
    fn dangling_edge_is_malformed() {
        let ex = Extraction {
            entities: vec![entity("User")],
            edges: vec![ExtractedEdge {
                source: "User".into(),
                target: "Ghost".into(),
                relation: "knows".into(),
                category: None,
            }],
            ..Default::default()
        };
        assert_matches!(ex.validate(), Err(BackendError::Malformed(msg)) if msg.contains("Ghost"));
    }

    #[test]
    fn confidence_out_of_range_is_malformed() {
        let ex = Extraction {
            entities: vec![entity("User")],
            facts: vec![fact("User", 1.5)],
            ..Default::default()
        };
        assert_matches!(ex.validate(), Err(BackendError::Malformed(_)));
        let ex = Extraction {
            entities: vec![entity("User")],
            facts: vec![fact("User", f64::NAN)],
            ..Default::default()
        };
        assert!(ex.validate().is_err());
    }

    #[test]
    fn empty_entity_name_is_malformed() {
        let ex = Extraction {
            entities: vec![entity("  ")],
            ..Default::default()
        };
        assert!(ex.validate().is_err());
    }

    #[test]
    fn punctuation_only_name_is_malformed() {
        let ex = Extraction {
            entities: vec![entity("Alice"), entity("???")],
            ..Default::default()
        };
        assert_matches!(ex.validate(), Err(BackendError::Malformed(msg)) if msg.contains("???"));
    }

    #[test]
    fn references_match_after_normalisation() {
        let ex = Extraction {
            entities: vec![entity("Acme, Inc.")],
            facts: vec![fact("acme inc", 0.5)],
            ..Default::default()
        };
        assert!(ex.validate().is_ok());
    }

    #[test]
    fn exclusive_defaults_to_true() {
        let f: ExtractedFact = serde_json::from_str(
            r#"{"subject":"u","predicate":"p","object":"o","fact_type":"state","confidence":0.5}"#,
        )
        .unwrap();
        assert!(f.exclusive);
        assert!(!f.object_is_entity);
    }

    #[test]
    fn timeout_display() {
        let err = BackendError::Timeout {
            operation: "extract",
            after_ms: 30_000,
        };
        assert_eq!(err.to_string(), "extract timed out after 30000ms");
    }
}
