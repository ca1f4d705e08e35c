//! # strata-context
//!
//! Context Assembler for the Strata memory subsystem.
//!
//! Builds a token-budgeted [`ContextSnapshot`] from the summary tree, the
//! knowledge graph and recent events. Sections are filled in a fixed
//! priority order:
//!
//! 1. user preferences (always present)
//! 2. identity
//! 3. recent activity
//! 4. channel summary
//! 5. learnings
//! 6. knowledge facts
//! 7. relevant entities
//! 8. topics
//!
//! Building never calls the extractor or summarizer, and is deterministic
//! for a given store state and request.

#![deny(unsafe_code)]

pub mod assembler;
pub mod errors;
pub mod section;
pub mod sources;

pub use assembler::{ContextAssembler, ContextRequest, ContextSnapshot};
pub use errors::{ContextError, Result};
pub use section::{Keep, Section, SectionKind, fit_items};
pub use sources::{ContextSources, LayerSources};
