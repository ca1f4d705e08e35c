//! Error types for the persistence layer.
//!
//! [`StoreError`] is returned by every repository and by [`EventStore`](crate::EventStore).

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Filesystem error (creating the database directory).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Event metadata failed validation.
    #[error("invalid metadata: {0}")]
    Metadata(#[from] strata_core::MetadataError),

    /// A forget pattern was not a valid regex.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An export document has a format version this build cannot read.
    #[error("unsupported export version {found} (expected {expected})")]
    UnsupportedExport {
        /// Version in the document.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// Requested record was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind.
        kind: &'static str,
        /// Lookup key.
        id: String,
    },
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_display() {
        let err = StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn not_found_display() {
        let err = StoreError::NotFound {
            kind: "event",
            id: "evt_1".into(),
        };
        assert_eq!(err.to_string(), "event not found: evt_1");
    }

    #[test]
    fn pattern_error_from_conversion() {
        let re_err = regex::Regex::new("(").unwrap_err();
        let err: StoreError = re_err.into();
        assert!(matches!(err, StoreError::Pattern(_)));
    }
}
