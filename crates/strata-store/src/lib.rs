//! # strata-store
//!
//! `SQLite` persistence for the Strata memory subsystem.
//!
//! - **Connection pool**: `r2d2` pool with WAL journaling, `synchronous = NORMAL`
//!   and foreign keys on every connection
//! - **Migrations**: version-tracked schema embedded at compile time
//! - **Repositories**: stateless per-table structs taking `&Connection`, so
//!   higher layers can compose them inside one transaction
//! - **Event store**: the append-only log API used by the interactive path
//! - **Export / import**: versioned whole-database snapshots

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod event_store;
pub mod export;
pub mod migrations;
pub mod repositories;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use errors::{Result, StoreError};
pub use event_store::{EventStore, ForgottenEvents};
pub use export::{EXPORT_VERSION, ImportReport, MemoryExport, export_all, import_all};
pub use repositories::event::StatusCounts;
pub use repositories::stats::MemoryStats;
