//! `SummaryTree`: pool-backed access to the Summary Tree.
//!
//! Refresh is split around the summarizer call: the scope is read and the
//! connection released before awaiting, then the result is written back in
//! one transaction. A failed call leaves the node untouched, so it stays a
//! candidate for the next cycle.

use chrono::Utc;
use rusqlite::Connection;
use strata_core::{MemoryBackend, SummaryNode};
use strata_settings::SummarySettings;
use strata_store::repositories::summary::SummaryRepo;
use strata_store::{ConnectionPool, PooledConnection};
use tracing::{debug, info, warn};

use crate::errors::{Result, SummaryError};
use crate::keys::{PREFERENCES_KEY, entity_key};
use crate::scope;
use crate::staleness::{self, StaleMarks};

/// Result of one successful refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Refreshed {
    /// Refreshed node.
    pub key: String,
    /// Staleness the refresh cleared.
    pub cleared: u32,
    /// Number of scoped items sent to the summarizer.
    pub items: usize,
}

/// The Summary Tree layer.
#[derive(Clone)]
pub struct SummaryTree {
    pool: ConnectionPool,
    settings: SummarySettings,
}

impl SummaryTree {
    /// Open the tree, creating the root and preferences nodes if missing.
    pub fn open(pool: ConnectionPool, settings: SummarySettings) -> Result<Self> {
        let tree = Self { pool, settings };
        {
            let conn = tree.conn()?;
            staleness::ensure_permanent(&conn)?;
        }
        Ok(tree)
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get().map_err(strata_store::StoreError::from)?)
    }

    fn atomic<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Mark the scopes touched by one extracted event as stale.
    pub fn mark(&self, marks: &StaleMarks) -> Result<Vec<String>> {
        self.atomic(|conn| staleness::apply_marks(conn, marks))
    }

    /// Mark a single existing node stale.
    pub fn mark_stale(&self, key: &str) -> Result<()> {
        self.atomic(|conn| staleness::mark_stale(conn, key))
    }

    /// Up to `max_batch` nodes above the staleness threshold, most stale
    /// first, ties to the least recently refreshed.
    pub fn select_candidates(&self, max_batch: usize) -> Result<Vec<SummaryNode>> {
        let conn = self.conn()?;
        Ok(SummaryRepo::candidates(&conn, self.settings.staleness_threshold, max_batch)?)
    }

    /// Candidates using the configured batch size.
    pub fn candidates(&self) -> Result<Vec<SummaryNode>> {
        self.select_candidates(self.settings.max_refresh_batch)
    }

    /// Regenerate one node's summary through the backend.
    ///
    /// An empty scope resets the staleness without calling the summarizer.
    /// An embedding failure keeps the new text and stores no embedding.
    pub async fn refresh(&self, key: &str, backend: &dyn MemoryBackend) -> Result<Refreshed> {
        let scope = {
            let conn = self.conn()?;
            let node = SummaryRepo::get(&conn, key)?
                .ok_or_else(|| SummaryError::NotFound(key.to_string()))?;
            scope::gather(&conn, &node, self.settings.max_scope_items)?
        };
        let items = scope.items.len();

        let (text, embedding) = if items == 0 {
            (scope.previous_summary.clone(), None)
        } else {
            let text = backend
                .summarize(&scope)
                .await
                .map_err(|source| SummaryError::Backend { node_key: key.to_string(), source })?;
            let embedding = match backend.embed(&text).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(node_key = key, error = %e, "summary embedding failed");
                    None
                }
            };
            (text, embedding)
        };

        let now = Utc::now();
        let cleared = self.atomic(|conn| {
            staleness::mark_refreshed(conn, key, &text, embedding.as_ref(), &now)
        })?;
        debug!(node_key = key, items, cleared, "summary refreshed");
        Ok(Refreshed { key: key.to_string(), cleared, items })
    }

    /// Get a node.
    pub fn get(&self, key: &str) -> Result<Option<SummaryNode>> {
        let conn = self.conn()?;
        Ok(SummaryRepo::get(&conn, key)?)
    }

    /// Non-empty summary text of a node.
    pub fn summary_text(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key)?.map(|n| n.summary).filter(|s| !s.is_empty()))
    }

    /// Summary text of the permanent preferences node.
    pub fn preferences_text(&self) -> Result<Option<String>> {
        self.summary_text(PREFERENCES_KEY)
    }

    /// Drop an entity's node, releasing its staleness from the ancestors.
    pub fn remove_entity(&self, entity_id: &str) -> Result<bool> {
        let key = entity_key(entity_id);
        let removed = self.atomic(|conn| staleness::remove_node(conn, &key))?;
        if removed {
            info!(node_key = %key, "summary node removed");
        }
        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
