//! The extraction cycle.
//!
//! ```text
//! Idle ─(timer)─▶ CheckActivity ─(recent activity)─▶ Skipped
//!                       │
//!                       └─(quiet)─▶ Run: extract ▶ refresh ▶ decay/boost
//! ```
//!
//! Each `Run` sub-step is fault-isolated. Failures are logged and recorded
//! in the [`CycleReport`]; nothing propagates out of a cycle. A cycle whose
//! storage reads fail extends the failure streak, and [`ExtractionScheduler::backoff`]
//! turns the streak into an exponential delay before the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use strata_core::constants::MAX_EXTRACTION_ATTEMPTS;
use strata_core::retry::calculate_backoff_delay;
use strata_core::text::normalize;
use strata_core::{Event, ExtractionStatus, MemoryBackend};
use strata_graph::{AppliedExtraction, KnowledgeGraph, NameEmbeddings};
use strata_relevance::RelevanceEngine;
use strata_settings::SchedulerSettings;
use strata_store::EventStore;
use strata_summary::{StaleMarks, SummaryTree};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activity::ActivityTracker;
use crate::errors::{Result, SchedulerError};
use crate::report::{CycleOutcome, CycleReport};

/// The layers a cycle reads and writes.
#[derive(Clone)]
pub struct Layers {
    /// Event log.
    pub store: EventStore,
    /// Knowledge Graph.
    pub graph: KnowledgeGraph,
    /// Summary Tree.
    pub tree: SummaryTree,
    /// Relevance & Decay Engine.
    pub relevance: RelevanceEngine,
}

/// Background extraction scheduler, generic over the backend.
pub struct ExtractionScheduler<B> {
    layers: Layers,
    backend: Arc<B>,
    activity: Arc<ActivityTracker>,
    settings: SchedulerSettings,
    runs: AtomicU64,
    storage_failures: AtomicU32,
}

impl<B: MemoryBackend> ExtractionScheduler<B> {
    /// Create a scheduler. `backend` should already be time-bounded.
    pub fn new(
        layers: Layers,
        backend: Arc<B>,
        activity: Arc<ActivityTracker>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            layers,
            backend,
            activity,
            settings,
            runs: AtomicU64::new(0),
            storage_failures: AtomicU32::new(0),
        }
    }

    /// Scheduler settings.
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Number of cycles that ran so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Consecutive run cycles whose storage access failed.
    pub fn storage_failures(&self) -> u32 {
        self.storage_failures.load(Ordering::SeqCst)
    }

    /// Extra wait before the next cycle: `interval × 2^(streak - 1)`, capped
    /// at `max_backoff_ms`. `None` while storage is healthy.
    pub fn backoff(&self) -> Option<Duration> {
        let streak = self.storage_failures();
        if streak == 0 {
            return None;
        }
        let ms = calculate_backoff_delay(
            streak - 1,
            self.settings.cycle_interval_ms,
            self.settings.max_backoff_ms,
        );
        Some(Duration::from_millis(ms))
    }

    /// One gated cycle: skipped while the activity tracker reports recent
    /// activity.
    pub async fn cycle(&self) -> CycleReport {
        self.cycle_until(&CancellationToken::new()).await
    }

    /// A gated cycle that stops between items once `cancel` fires.
    pub async fn cycle_until(&self, cancel: &CancellationToken) -> CycleReport {
        let quiet = Duration::from_millis(self.settings.quiet_threshold_ms);
        if !self.activity.is_quiet(quiet) {
            debug!(idle_ms = ?self.activity.idle_for().map(|d| d.as_millis()), "cycle skipped: recent activity");
            return CycleReport::new(self.runs(), CycleOutcome::Skipped);
        }
        self.run(cancel).await
    }

    /// Run every sub-step now, regardless of activity.
    pub async fn run(&self, cancel: &CancellationToken) -> CycleReport {
        let cycle = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let mut report = CycleReport::new(cycle, CycleOutcome::Ran);

        self.extract_step(cancel, &mut report).await;
        if !cancel.is_cancelled() {
            self.refresh_step(cancel, &mut report).await;
        }
        if !cancel.is_cancelled() {
            self.relevance_step(cycle, &mut report);
        }

        if report.storage_failed {
            let streak = self.storage_failures.fetch_add(1, Ordering::SeqCst) + 1;
            warn!(cycle, streak, "storage failing, backing off");
        } else {
            self.storage_failures.store(0, Ordering::SeqCst);
        }

        info!(
            cycle,
            extracted = report.extracted,
            failed = report.failed,
            skipped = report.skipped,
            refreshed = report.refreshed,
            refresh_failed = report.refresh_failed,
            decayed = report.decayed,
            boosted = report.boosted,
            errors = report.errors.len(),
            "cycle complete"
        );
        report
    }

    // ── Extraction ──────────────────────────────────────────────────────

    async fn extract_step(&self, cancel: &CancellationToken, report: &mut CycleReport) {
        let pending = match self.layers.store.get_pending(self.settings.batch_size) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "extraction step: loading pending events failed");
                report.errors.push(format!("extract: {e}"));
                report.storage_failed = true;
                return;
            }
        };

        for event in pending {
            if cancel.is_cancelled() {
                debug!("extraction step interrupted by shutdown");
                break;
            }
            if event.content.trim().is_empty() {
                self.set_status(&event, ExtractionStatus::Skipped, report);
                report.skipped += 1;
                continue;
            }
            match self.extract_one(&event).await {
                Ok(applied) => {
                    self.mark_summaries(&event, &applied, report);
                    self.set_status(&event, ExtractionStatus::Complete, report);
                    report.extracted += 1;
                }
                Err(e) => self.record_failure(&event, &e, report),
            }
        }
    }

    async fn extract_one(&self, event: &Event) -> Result<AppliedExtraction> {
        let extraction = self.backend.extract(&event.content).await?;
        extraction.validate()?;

        let mut unique: Vec<(String, &str)> = Vec::new();
        for entity in &extraction.entities {
            let key = normalize(&entity.name);
            if !unique.iter().any(|(k, _)| *k == key) {
                unique.push((key, entity.name.trim()));
            }
        }
        let embedded = join_all(unique.iter().map(|(_, name)| self.backend.embed(name))).await;
        let mut names = NameEmbeddings::new();
        for ((key, name), result) in unique.into_iter().zip(embedded) {
            match result {
                Ok(v) => {
                    let _ = names.insert(key, v);
                }
                Err(e) => {
                    warn!(event_id = %event.id, entity = name, error = %e, "name embedding failed, resolving by alias only");
                }
            }
        }

        let mut event = event.clone();
        if event.embedding.is_none() && !extraction.topics.is_empty() {
            match self.backend.embed(&event.content).await {
                Ok(v) => event.embedding = Some(v),
                Err(e) => warn!(event_id = %event.id, error = %e, "content embedding failed, topics by label only"),
            }
        }

        Ok(self.layers.graph.apply_extraction(&event, &extraction, &names)?)
    }

    fn mark_summaries(&self, event: &Event, applied: &AppliedExtraction, report: &mut CycleReport) {
        let marks = StaleMarks {
            channel: Some(event.channel.clone()),
            entities: applied
                .entities
                .iter()
                .map(|r| (r.entity_id.clone(), r.entity_type))
                .collect(),
            topics: applied.topics.clone(),
            preferences: applied.touches_preferences(),
        };
        if let Err(e) = self.layers.tree.mark(&marks) {
            warn!(event_id = %event.id, error = %e, "marking summaries stale failed");
            report.errors.push(format!("event {}: {e}", event.id));
        }
    }

    /// First failure: `failed` (retried next cycle). Second: `skipped`.
    fn record_failure(&self, event: &Event, err: &SchedulerError, report: &mut CycleReport) {
        let attempt = event.extraction_attempts + 1;
        let status = if attempt >= MAX_EXTRACTION_ATTEMPTS {
            ExtractionStatus::Skipped
        } else {
            ExtractionStatus::Failed
        };
        warn!(event_id = %event.id, attempt, status = %status, error = %err, "extraction failed");
        report.errors.push(format!("event {}: {err}", event.id));
        self.set_status(event, status, report);
        match status {
            ExtractionStatus::Skipped => report.skipped += 1,
            _ => report.failed += 1,
        }
    }

    fn set_status(&self, event: &Event, status: ExtractionStatus, report: &mut CycleReport) {
        if let Err(e) = self.layers.store.mark_extracted(&event.id, status) {
            warn!(event_id = %event.id, status = %status, error = %e, "updating extraction status failed");
            report.errors.push(format!("event {}: {e}", event.id));
        }
    }

    // ── Summary refresh ─────────────────────────────────────────────────

    async fn refresh_step(&self, cancel: &CancellationToken, report: &mut CycleReport) {
        let candidates = match self.layers.tree.candidates() {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "refresh step: selecting candidates failed");
                report.errors.push(format!("refresh: {e}"));
                report.storage_failed = true;
                return;
            }
        };
        for node in candidates {
            if cancel.is_cancelled() {
                break;
            }
            match self.layers.tree.refresh(&node.key, self.backend.as_ref()).await {
                Ok(done) => {
                    debug!(node_key = %done.key, cleared = done.cleared, "node refreshed");
                    report.refreshed += 1;
                }
                Err(e) => {
                    warn!(node_key = %node.key, staleness = node.staleness, error = %e, "summary refresh failed");
                    report.errors.push(format!("node {}: {e}", node.key));
                    report.refresh_failed += 1;
                }
            }
        }
    }

    // ── Decay / boost ───────────────────────────────────────────────────

    fn relevance_step(&self, cycle: u64, report: &mut CycleReport) {
        let now = Utc::now();
        if due(cycle, self.settings.decay_every_cycles) {
            match self.layers.relevance.apply_decay(now) {
                Ok(n) => report.decayed = n,
                Err(e) => {
                    warn!(cycle, error = %e, "decay failed");
                    report.errors.push(format!("decay: {e}"));
                    report.storage_failed = true;
                }
            }
        }
        if due(cycle, self.settings.boost_every_cycles) {
            match self.layers.relevance.apply_boost(now) {
                Ok(n) => report.boosted = n,
                Err(e) => {
                    warn!(cycle, error = %e, "access boost failed");
                    report.errors.push(format!("boost: {e}"));
                    report.storage_failed = true;
                }
            }
        }
    }
}

/// Every `every`-th run cycle; never when `every` is 0.
fn due(cycle: u64, every: u32) -> bool {
    every > 0 && cycle % u64::from(every) == 0
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
