//! Event model.
//!
//! An [`Event`] is the immutable record of one interaction. Content,
//! channel, kind and metadata never change after append; the Event Store
//! only mutates extraction bookkeeping and relevance fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::INITIAL_RELEVANCE;
use crate::ids::{EntityId, EventId};
use crate::metadata::EventMetadata;

macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire / storage representation.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Parse the storage representation.
            #[must_use]
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($s => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use str_enum;

str_enum! {
    /// Which way an interaction flowed.
    Direction {
        /// From the user / channel into the agent.
        Inbound => "inbound",
        /// From the agent out to the channel.
        Outbound => "outbound",
        /// Internal bookkeeping (tool traffic, observations).
        Internal => "internal",
    }
}

str_enum! {
    /// What the event records.
    EventKind {
        /// Conversational message.
        Message => "message",
        /// Tool invocation.
        ToolCall => "tool_call",
        /// Tool output (links to its call via `parent_id`).
        ToolResult => "tool_result",
        /// Passive observation.
        Observation => "observation",
    }
}

str_enum! {
    /// Extraction lifecycle of an event.
    ExtractionStatus {
        /// Not yet processed.
        Pending => "pending",
        /// Extracted into the Knowledge Graph.
        Complete => "complete",
        /// Permanently skipped (empty, or failed twice).
        Skipped => "skipped",
        /// Failed once; eligible for one retry.
        Failed => "failed",
    }
}

/// A persisted, immutable interaction record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique ID.
    pub id: EventId,
    /// Monotonic append sequence (storage order).
    pub sequence: i64,
    /// When the interaction happened.
    pub timestamp: DateTime<Utc>,
    /// Channel the interaction came through.
    pub channel: String,
    /// Flow direction.
    pub direction: Direction,
    /// Event kind.
    pub kind: EventKind,
    /// Raw (possibly redacted) content.
    pub content: String,
    /// Optional content embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Conversation session key.
    pub session_key: String,
    /// Parent event (e.g. `tool_result` → `tool_call`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EventId>,
    /// Entity this event is about, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_entity_id: Option<EntityId>,
    /// Extraction lifecycle status.
    pub extraction_status: ExtractionStatus,
    /// Number of extraction attempts made so far.
    #[serde(default)]
    pub extraction_attempts: u32,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
    /// Retrieval weight in `[floor, 1.0]`, owned by the Decay Engine.
    pub relevance_score: f64,
    /// Last time a read path returned this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// SHA-256 of the content (hex).
    pub checksum: String,
}

/// Input for appending an event. IDs, sequence and checksum are assigned by
/// the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    /// Channel the interaction came through.
    pub channel: String,
    /// Flow direction.
    pub direction: Direction,
    /// Event kind.
    pub kind: EventKind,
    /// Raw content.
    pub content: String,
    /// Conversation session key.
    pub session_key: String,
    /// Parent event.
    pub parent_id: Option<EventId>,
    /// Entity this event is about.
    pub subject_entity_id: Option<EntityId>,
    /// Optional precomputed embedding.
    pub embedding: Option<Vec<f32>>,
    /// Metadata.
    pub metadata: EventMetadata,
    /// Override the timestamp (defaults to now).
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewEvent {
    /// A message event.
    pub fn message(
        channel: impl Into<String>,
        direction: Direction,
        session_key: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            direction,
            kind: EventKind::Message,
            content: content.into(),
            session_key: session_key.into(),
            parent_id: None,
            subject_entity_id: None,
            embedding: None,
            metadata: EventMetadata::new(),
            timestamp: None,
        }
    }

    /// Change the kind.
    #[must_use]
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Link to a parent event.
    #[must_use]
    pub fn parent(mut self, parent_id: EventId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Attach a subject entity.
    #[must_use]
    pub fn subject(mut self, entity_id: EntityId) -> Self {
        self.subject_entity_id = Some(entity_id);
        self
    }

    /// Attach a content embedding.
    #[must_use]
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Pin the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl Event {
    /// Relevance assigned to a freshly appended event.
    pub const INITIAL_RELEVANCE: f64 = INITIAL_RELEVANCE;

    /// Whether the event is eligible for extraction in the next cycle.
    #[must_use]
    pub fn is_extractable(&self) -> bool {
        match self.extraction_status {
            ExtractionStatus::Pending => true,
            ExtractionStatus::Failed => {
                self.extraction_attempts < crate::constants::MAX_EXTRACTION_ATTEMPTS
            }
            ExtractionStatus::Complete | ExtractionStatus::Skipped => false,
        }
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[test]
    fn enum_roundtrip_all_variants() {
        for d in Direction::ALL {
            assert_eq!(Direction::parse(d.as_str()), Some(*d));
        }
        for k in EventKind::ALL {
            assert_eq!(EventKind::parse(k.as_str()), Some(*k));
        }
        for s in ExtractionStatus::ALL {
            assert_eq!(ExtractionStatus::parse(s.as_str()), Some(*s));
        }
        assert_eq!(EventKind::parse("nope"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventKind::ToolResult).unwrap(),
            "\"tool_result\""
        );
    }

    #[test]
    fn builder_sets_fields() {
        let parent = EventId::from("evt_parent");
        let ev = NewEvent::message("slack", Direction::Internal, "s1", "ok")
            .kind(EventKind::ToolResult)
            .parent(parent.clone());
        assert_eq!(ev.kind, EventKind::ToolResult);
        assert_eq!(ev.parent_id, Some(parent));
        assert!(ev.timestamp.is_none());
    }

    fn event_with(status: ExtractionStatus, attempts: u32) -> Event {
        Event {
            id: EventId::new(),
            sequence: 1,
            timestamp: Utc::now(),
            channel: "c".into(),
            direction: Direction::Inbound,
            kind: EventKind::Message,
            content: "x".into(),
            embedding: None,
            session_key: "s".into(),
            parent_id: None,
            subject_entity_id: None,
            extraction_status: status,
            extraction_attempts: attempts,
            metadata: EventMetadata::new(),
            relevance_score: 1.0,
            last_accessed: None,
            checksum: String::new(),
        }
    }

    #[test]
    fn extractable_states() {
        assert!(event_with(ExtractionStatus::Pending, 0).is_extractable());
        assert!(event_with(ExtractionStatus::Failed, 1).is_extractable());
        assert!(!event_with(ExtractionStatus::Failed, 2).is_extractable());
        assert!(!event_with(ExtractionStatus::Complete, 1).is_extractable());
        assert!(!event_with(ExtractionStatus::Skipped, 0).is_extractable());
    }
}
