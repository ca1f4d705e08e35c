//! Persistence settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Local `SQLite` store settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Database file path; a leading `~/` expands to `$HOME`.
    pub path: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "~/.strata/memory.db".to_string(),
            pool_size: 8,
            busy_timeout_ms: 5000,
        }
    }
}

impl StoreSettings {
    /// The database path with `~/` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        match self.path.strip_prefix("~/") {
            Some(rest) => {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(rest)
            }
            None => PathBuf::from(&self.path),
        }
    }
}
