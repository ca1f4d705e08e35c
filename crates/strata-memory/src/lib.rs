//! # strata-memory
//!
//! Layered long-term memory for a conversational assistant.
//!
//! [`MemorySystem`] ties the layers together behind one API:
//!
//! - **Event Store**: append-only log of every interaction, redacted
//!   before it is written
//! - **Knowledge Graph**: entities, edges and facts with supersession,
//!   fed by the background extractor
//! - **Summary Tree**: hierarchical summaries refreshed once enough
//!   changes accumulate
//! - **Relevance & Decay**: time decay and access boosts on events,
//!   half-life weighted learnings
//! - **Context Assembler**: budgeted, deterministic context snapshots
//!
//! The external extractor, embedder and summarizer are supplied as one
//! [`MemoryBackend`](strata_core::MemoryBackend). Every call to it is
//! time-bounded, and only the background task writes to the graph and the
//! summary tree.

#![deny(unsafe_code)]

pub mod errors;
pub mod redaction;
pub mod search;
pub mod system;

pub use errors::{MemoryError, Result};
pub use redaction::{Redacted, Redactor};
pub use search::{HitKind, SearchHit};
pub use system::{Forget, ForgetReport, MemorySystem};

pub use strata_context::{ContextRequest, ContextSnapshot, Section, SectionKind};
pub use strata_scheduler::{BackgroundHandle, CycleOutcome, CycleReport};
pub use strata_settings::StrataSettings;

/// Install the global tracing subscriber described by `settings.logging`.
/// A no-op when a subscriber is already set.
pub fn init_logging(settings: &StrataSettings) {
    strata_logging::init_from_settings(&settings.logging);
}
