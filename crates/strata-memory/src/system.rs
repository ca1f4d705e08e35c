//! `MemorySystem`: the caller-facing facade.
//!
//! Owns one connection pool shared by every layer, the activity tracker
//! and the time-bounded backend. The interactive path (`log_event`,
//! `build_context`, reads) runs on the caller's task; extraction, summary
//! refresh and decay run in the background task from
//! [`start_background`](MemorySystem::start_background) or on demand
//! through [`run_cycle`](MemorySystem::run_cycle).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use strata_context::{ContextAssembler, ContextRequest, ContextSnapshot, LayerSources};
use strata_core::{
    Direction, Event, EventId, Fact, Learning, LearningId, MemoryBackend, NewEvent, NewLearning,
};
use strata_graph::{EntityView, KnowledgeGraph};
use strata_relevance::{RelevanceEngine, WeightedLearning};
use strata_scheduler::{
    ActivityTracker, BackgroundHandle, CycleReport, ExtractionScheduler, Layers, TimeoutBackend,
};
use strata_settings::StrataSettings;
use strata_store::repositories::stats::StatsRepo;
use strata_store::{ConnectionPool, EventStore, ImportReport, MemoryExport, MemoryStats, connection};
use strata_summary::SummaryTree;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::redaction::Redactor;
use crate::search::{self, SearchHit};

/// What to forget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Forget {
    /// An entity by any alias, with its edges, facts and summary node.
    Entity(String),
    /// Every event whose content matches a regex.
    Pattern(String),
}

/// What a forget removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ForgetReport {
    /// Entities deleted.
    pub entities: usize,
    /// Edges deleted.
    pub edges: u64,
    /// Facts deleted.
    pub facts: usize,
    /// Events deleted.
    pub events: usize,
}

/// The layered memory subsystem.
pub struct MemorySystem<B: MemoryBackend + 'static> {
    settings: Arc<StrataSettings>,
    layers: Layers,
    redactor: Redactor,
    activity: Arc<ActivityTracker>,
    backend: Arc<TimeoutBackend<B>>,
    scheduler: Arc<ExtractionScheduler<TimeoutBackend<B>>>,
    context: ContextAssembler<LayerSources>,
}

impl<B: MemoryBackend + 'static> MemorySystem<B> {
    /// Open the store at the configured path.
    pub fn open(settings: StrataSettings, backend: B) -> Result<Self> {
        settings.validate()?;
        let pool = connection::open(&settings.store)?;
        Self::with_pool(pool, settings, backend)
    }

    /// Open over an in-memory store.
    pub fn in_memory(settings: StrataSettings, backend: B) -> Result<Self> {
        settings.validate()?;
        let pool = connection::new_in_memory()?;
        Self::with_pool(pool, settings, backend)
    }

    /// Build every layer over an existing pool.
    pub fn with_pool(pool: ConnectionPool, settings: StrataSettings, backend: B) -> Result<Self> {
        let settings = Arc::new(settings);
        let layers = Layers {
            store: EventStore::new(pool.clone()),
            graph: KnowledgeGraph::new(pool.clone(), settings.graph.clone()),
            tree: SummaryTree::open(pool.clone(), settings.summary.clone())?,
            relevance: RelevanceEngine::new(pool, settings.relevance.clone()),
        };
        let redactor = Redactor::new(&settings.redaction)?;
        let activity = Arc::new(ActivityTracker::new());
        let limit = Duration::from_millis(settings.scheduler.call_timeout_ms);
        let backend = Arc::new(TimeoutBackend::new(backend, limit));
        let scheduler = Arc::new(ExtractionScheduler::new(
            layers.clone(),
            Arc::clone(&backend),
            Arc::clone(&activity),
            settings.scheduler.clone(),
        ));
        let sources = LayerSources::new(
            layers.store.clone(),
            layers.graph.clone(),
            layers.tree.clone(),
            layers.relevance.clone(),
        );
        let context = ContextAssembler::new(sources, settings.context.clone());
        info!(redaction_rules = redactor.len(), "memory system ready");
        Ok(Self { settings, layers, redactor, activity, backend, scheduler, context })
    }

    /// Effective settings.
    pub fn settings(&self) -> &StrataSettings {
        &self.settings
    }

    /// Shared activity tracker.
    pub fn activity(&self) -> &Arc<ActivityTracker> {
        &self.activity
    }

    /// The layers, for direct inspection.
    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    // ── Interactive path ────────────────────────────────────────────────

    /// Redact and append an event. Never waits on extraction. Inbound
    /// events count as user activity and hold off the background cycle.
    pub fn log_event(&self, mut new: NewEvent) -> Result<Event> {
        let redacted = self.redactor.redact(&new.content);
        if redacted.changed() {
            debug!(kinds = ?redacted.kinds, "event content redacted");
            new.content = redacted.text;
            new.metadata.insert("redacted", Value::Bool(true))?;
        }
        if new.direction == Direction::Inbound {
            self.activity.record();
        }
        Ok(self.layers.store.append(new)?)
    }

    /// Assemble a context snapshot. Never fails: unavailable layers leave
    /// their sections out.
    pub fn build_context(&self, request: &ContextRequest) -> ContextSnapshot {
        self.context.build(request)
    }

    /// Ranked events, entities and facts for `query`. Returned events are
    /// marked as accessed.
    pub async fn search_memory(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let embedding = match self.backend.embed(query).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "query embedding failed, literal search only");
                None
            }
        };
        let hits = {
            let conn = self.layers.store.pool().get().map_err(strata_store::StoreError::from)?;
            search::search(&conn, query, embedding.as_deref(), limit)?
        };
        let accessed: Vec<EventId> = hits
            .iter()
            .filter(|h| h.kind == search::HitKind::Event)
            .map(|h| EventId::from(h.id.as_str()))
            .collect();
        if !accessed.is_empty() {
            let _ = self.layers.store.touch(&accessed)?;
        }
        Ok(hits)
    }

    /// Entity with relations and active facts, by any alias.
    pub fn get_entity(&self, name: &str) -> Result<Option<EntityView>> {
        Ok(self.layers.graph.get_entity(name)?)
    }

    /// Every version of `subject predicate`, oldest first.
    pub fn fact_history(&self, subject: &str, predicate: &str) -> Result<Vec<Fact>> {
        Ok(self.layers.graph.fact_history(subject, predicate)?)
    }

    /// Delete an entity or the events matching a pattern.
    pub fn forget(&self, target: &Forget) -> Result<ForgetReport> {
        let mut report = ForgetReport::default();
        match target {
            Forget::Entity(name) => {
                if let Some(gone) = self.layers.graph.forget_entity(name)? {
                    let _ = self.layers.tree.remove_entity(&gone.entity_id)?;
                    report.entities = 1;
                    report.edges = gone.edges;
                    report.facts = gone.facts;
                }
            }
            Forget::Pattern(pattern) => {
                let gone = self.layers.store.delete_matching(pattern)?;
                report.events = gone.events;
                report.facts = gone.facts;
            }
        }
        Ok(report)
    }

    /// Snapshot of every table.
    pub fn export_all(&self) -> Result<MemoryExport> {
        let conn = self.layers.store.pool().get().map_err(strata_store::StoreError::from)?;
        Ok(strata_store::export_all(&conn)?)
    }

    /// Load an export, skipping rows that already exist.
    pub fn import_all(&self, export: &MemoryExport) -> Result<ImportReport> {
        let conn = self.layers.store.pool().get().map_err(strata_store::StoreError::from)?;
        Ok(strata_store::import_all(&conn, export)?)
    }

    // ── Learnings ───────────────────────────────────────────────────────

    /// Record a learning.
    pub fn record_learning(&self, learning: NewLearning) -> Result<Learning> {
        Ok(self.layers.relevance.record_learning(learning, Utc::now())?)
    }

    /// Replace an active learning.
    pub fn supersede_learning(&self, old: &LearningId, learning: NewLearning) -> Result<Learning> {
        Ok(self.layers.relevance.supersede_learning(old, learning, Utc::now())?)
    }

    /// Active learnings, heaviest first.
    pub fn active_learnings(&self, limit: usize) -> Result<Vec<WeightedLearning>> {
        Ok(self.layers.relevance.active_learnings(Utc::now(), limit)?)
    }

    /// Row counts across every layer.
    pub fn stats(&self) -> Result<MemoryStats> {
        let conn = self.layers.store.pool().get().map_err(strata_store::StoreError::from)?;
        Ok(StatsRepo::collect(&conn)?)
    }

    // ── Background ──────────────────────────────────────────────────────

    /// One scheduler cycle, skipped while the user is active.
    pub async fn run_cycle(&self) -> CycleReport {
        self.scheduler.cycle().await
    }

    /// One scheduler cycle regardless of activity.
    pub async fn force_cycle(&self) -> CycleReport {
        self.scheduler.run(&CancellationToken::new()).await
    }

    /// Spawn the periodic background task on the current runtime.
    pub fn start_background(&self) -> BackgroundHandle {
        strata_scheduler::spawn(Arc::clone(&self.scheduler))
    }

    /// Configured shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.settings.scheduler.shutdown_grace_ms)
    }
}
