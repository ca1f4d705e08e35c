//! `SQLite` connection pool with WAL mode and foreign keys enabled.
//!
//! Uses `r2d2` connection pooling with the `r2d2_sqlite` backend. The
//! [`PragmaCustomizer`] runs on each new connection so every connection
//! gets write-ahead journaling, relaxed `NORMAL` durability, a busy timeout
//! and foreign-key enforcement. Opening a pool also applies migrations.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use strata_settings::StoreSettings;
use tracing::info;

use crate::errors::Result;
use crate::migrations::run_migrations;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Configuration for the connection pool.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from(&StoreSettings::default())
    }
}

impl From<&StoreSettings> for ConnectionConfig {
    fn from(s: &StoreSettings) -> Self {
        Self {
            pool_size: s.pool_size,
            busy_timeout_ms: s.busy_timeout_ms,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};\
             PRAGMA journal_mode = WAL;\
             PRAGMA foreign_keys = ON;\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

/// Create a migrated in-memory pool (for tests).
///
/// Every `:memory:` connection is a separate database, so the pool holds
/// exactly one connection that is never recycled. Callers must not hold two
/// pooled connections at once.
pub fn new_in_memory() -> Result<ConnectionPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: 5000,
        }))
        .build(manager)?;
    migrate(&pool)?;
    Ok(pool)
}

/// Create a migrated file-backed pool, creating the parent directory.
pub fn new_file(path: &Path, config: &ConnectionConfig) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)?;
    migrate(&pool)?;
    info!(path = %path.display(), pool_size = config.pool_size, "memory store opened");
    Ok(pool)
}

/// Open the pool described by the `store` settings section.
pub fn open(settings: &StoreSettings) -> Result<ConnectionPool> {
    new_file(&settings.resolved_path(), &ConnectionConfig::from(settings))
}

fn migrate(pool: &ConnectionPool) -> Result<()> {
    let conn = pool.get()?;
    let _ = run_migrations(&conn)?;
    Ok(())
}

/// Verify pragmas are set correctly on a connection.
pub fn verify_pragmas(conn: &Connection) -> Result<PragmaState> {
    let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    let synchronous: i32 = conn.query_row("PRAGMA synchronous", [], |row| row.get(0))?;
    Ok(PragmaState {
        journal_mode,
        foreign_keys_enabled: foreign_keys == 1,
        synchronous,
    })
}

/// Pragma state for verification.
#[derive(Debug)]
pub struct PragmaState {
    /// Journal mode (`wal` for files, `memory` for in-memory databases).
    pub journal_mode: String,
    /// Whether foreign keys are enabled.
    pub foreign_keys_enabled: bool,
    /// `synchronous` level (1 = NORMAL).
    pub synchronous: i32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
