//! # strata-logging
//!
//! Structured logging for the Strata crates.
//!
//! Every crate logs through `tracing` macros with structured fields
//! (`event_id`, `node_key`, `entity_id`, `cycle`). This crate owns the
//! subscriber setup for binaries embedding the memory subsystem, and an
//! in-memory capture layer for tests that assert on log output.

#![deny(unsafe_code)]

pub mod capture;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};

use strata_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with compact stderr output.
///
/// `RUST_LOG` takes precedence over `level`. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already set
    let _ = subscriber.try_init();
}

/// Initialize the global tracing subscriber with JSON-lines stderr output.
///
/// Subsequent calls (or calls after [`init_subscriber`]) are no-ops.
pub fn init_json_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .flatten_event(true);

    let _ = subscriber.try_init();
}

/// Initialize from the `logging` settings section.
pub fn init_from_settings(settings: &LoggingSettings) {
    if settings.json {
        init_json_subscriber(&settings.level);
    } else {
        init_subscriber(&settings.level);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
