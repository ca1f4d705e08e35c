//! # strata-core
//!
//! Foundation types shared by every Strata crate.
//!
//! - **Branded IDs**: `EventId`, `EntityId`, `FactId`, ... as prefixed UUID v7 newtypes
//! - **Event model**: immutable [`Event`] records plus the [`NewEvent`] builder
//! - **Graph model**: [`Entity`], [`Edge`], [`Fact`], [`Topic`]
//! - **Summary model**: [`SummaryNode`] and [`NodeType`]
//! - **Learnings**: self-improvement records with supersession
//! - **Backend**: the [`MemoryBackend`] capability trait (extract / embed / summarize)
//! - **Text + time**: token estimation, deterministic truncation, timestamp codec
//! - **Retry**: exponential backoff for storage failures

#![deny(unsafe_code)]

pub mod backend;
pub mod constants;
pub mod event;
pub mod graph;
pub mod ids;
pub mod learning;
pub mod metadata;
pub mod retry;
pub mod summary;
pub mod text;
pub mod time;

pub use backend::{
    BackendError, BackendResult, ExtractedEdge, ExtractedEntity, ExtractedFact, Extraction,
    MemoryBackend, SummaryScope,
};
pub use event::{Direction, Event, EventKind, ExtractionStatus, NewEvent};
pub use graph::{Edge, Entity, EntityType, Fact, FactObject, FactType, Topic};
pub use ids::{EdgeId, EntityId, EventId, FactId, LearningId, TopicId};
pub use learning::{Learning, LearningSource, NewLearning, Sentiment};
pub use metadata::{EventMetadata, MetadataError};
pub use summary::{NodeType, SummaryNode};
