//! # strata-scheduler
//!
//! Extraction Scheduler of the Strata memory subsystem.
//!
//! A single background loop that, once the [`ActivityTracker`] has been
//! quiet long enough, runs in strict sequence:
//!
//! 1. extraction over up to `batch_size` pending events (retry once, then
//!    skip), feeding the Knowledge Graph and marking summaries stale
//! 2. summary refresh over the current candidates
//! 3. decay and access boost, each on its own every-Nth-cycle cadence
//!
//! Every backend call is bounded by [`TimeoutBackend`]; a timeout is a
//! failure like any other. Sub-steps are fault-isolated and report through
//! [`CycleReport`] instead of returning errors.

#![deny(unsafe_code)]

pub mod activity;
pub mod background;
pub mod errors;
pub mod report;
pub mod scheduler;
pub mod timeout;

pub use activity::ActivityTracker;
pub use background::{BackgroundHandle, spawn};
pub use errors::{Result, SchedulerError};
pub use report::{CycleOutcome, CycleReport};
pub use scheduler::{ExtractionScheduler, Layers};
pub use timeout::TimeoutBackend;
