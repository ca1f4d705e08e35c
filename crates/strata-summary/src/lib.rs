//! # strata-summary
//!
//! Summary Tree layer of the Strata memory subsystem.
//!
//! Pre-computed summaries keyed by scope (root, channel, entity type,
//! entity, topic, user preferences), refreshed lazily once enough activity
//! has accumulated under them.
//!
//! - [`keys`]: node key scheme and parsing
//! - [`staleness`]: node creation, stale marking with ancestor propagation,
//!   saturating release on refresh or removal
//! - [`scope`]: the scoped material each node type is summarised from
//! - [`SummaryTree`]: candidate selection and backend-driven refresh

#![deny(unsafe_code)]

pub mod errors;
pub mod keys;
pub mod scope;
pub mod staleness;
pub mod tree;

pub use errors::{Result, SummaryError};
pub use keys::{PREFERENCES_KEY, ROOT_KEY, channel_key, entity_key, entity_type_key, topic_key};
pub use staleness::StaleMarks;
pub use tree::{Refreshed, SummaryTree};

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;
    use strata_store::migrations::run_migrations;

    pub(crate) fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }
}
