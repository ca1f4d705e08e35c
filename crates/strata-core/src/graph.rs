//! Knowledge Graph model: entities, edges, facts and topics.
//!
//! Cross-references are stable IDs only; no record holds another record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::str_enum;
use crate::ids::{EdgeId, EntityId, EventId, FactId, TopicId};

str_enum! {
    /// Kind of a resolved entity.
    EntityType {
        /// A person.
        Person => "person",
        /// Company or organisation.
        Org => "org",
        /// Place.
        Location => "location",
        /// Abstract idea.
        Concept => "concept",
        /// Software or physical tool.
        Tool => "tool",
        /// Subject of discussion.
        Topic => "topic",
    }
}

str_enum! {
    /// Kind of a fact.
    FactType {
        /// Relationship to another entity.
        Relation => "relation",
        /// Intrinsic attribute.
        Attribute => "attribute",
        /// User preference.
        Preference => "preference",
        /// Transient state.
        State => "state",
    }
}

/// A resolved, canonical named thing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique ID.
    pub id: EntityId,
    /// Canonical name (first name seen).
    pub name: String,
    /// Entity type.
    pub entity_type: EntityType,
    /// Every surface form that resolved here, canonical name included.
    pub aliases: Vec<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Embedding of the canonical name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_embedding: Option<Vec<f32>>,
    /// Events that mentioned this entity.
    #[serde(default)]
    pub event_ids: Vec<EventId>,
    /// Number of mentions.
    pub mention_count: u32,
    /// First mention.
    pub first_seen: DateTime<Utc>,
    /// Latest mention.
    pub last_seen: DateTime<Utc>,
}

/// Directed relation between two entities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique ID.
    pub id: EdgeId,
    /// Source entity.
    pub source_id: EntityId,
    /// Target entity.
    pub target_id: EntityId,
    /// Relation label (normalised).
    pub relation: String,
    /// Coarse relation category.
    pub category: String,
    /// Strength in `[0, 1]`.
    pub strength: f64,
    /// Contributing events.
    #[serde(default)]
    pub event_ids: Vec<EventId>,
    /// First mention.
    pub first_seen: DateTime<Utc>,
    /// Latest mention.
    pub last_seen: DateTime<Utc>,
}

/// Object of a fact: a literal or a reference to another entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FactObject {
    /// Literal text.
    Literal(String),
    /// Another entity.
    Entity(EntityId),
}

impl FactObject {
    /// Storage kind tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Entity(_) => "entity",
        }
    }

    /// Raw value (literal text or entity id).
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Entity(id) => id.as_str(),
        }
    }

    /// Rebuild from the storage pair.
    #[must_use]
    pub fn from_parts(kind: &str, value: String) -> Self {
        if kind == "entity" {
            Self::Entity(EntityId::from(value))
        } else {
            Self::Literal(value)
        }
    }
}

/// Subject-predicate-object assertion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Unique ID.
    pub id: FactId,
    /// Subject entity.
    pub subject_id: EntityId,
    /// Predicate (normalised).
    pub predicate: String,
    /// Object.
    pub object: FactObject,
    /// Fact type.
    pub fact_type: FactType,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Number of times this fact was (re-)asserted.
    pub strength: u32,
    /// Whether a different object for the same subject+predicate supersedes this one.
    pub exclusive: bool,
    /// Contributing events.
    #[serde(default)]
    pub event_ids: Vec<EventId>,
    /// Start of validity.
    pub valid_from: DateTime<Utc>,
    /// End of validity (set when superseded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    /// The fact that replaced this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<FactId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

impl Fact {
    /// Whether the fact is the current assertion.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }
}

/// Theme cluster with an embedding centroid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Unique ID.
    pub id: TopicId,
    /// Human label (normalised).
    pub label: String,
    /// Running-mean centroid of linked event embeddings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Vec<f32>>,
    /// Number of linked events.
    pub event_count: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}
