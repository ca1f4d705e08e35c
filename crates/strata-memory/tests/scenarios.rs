//! End-to-end scenarios over the whole memory stack with a scripted backend.

#![allow(unused_results)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::Level;

use strata_core::{
    BackendError, BackendResult, Direction, EntityType, ExtractedEntity, ExtractedFact, Extraction,
    FactType, LearningSource, MemoryBackend, NewEvent, NewLearning, SummaryScope,
};
use strata_memory::{
    ContextRequest, CycleOutcome, Forget, HitKind, MemoryError, MemorySystem, SectionKind,
    StrataSettings,
};

// ─────────────────────────────────────────────────────────────────────────────
// Scripted backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    extractions: Mutex<HashMap<String, Extraction>>,
    failing: Mutex<HashSet<String>>,
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    extracts: AtomicUsize,
    summaries: AtomicUsize,
}

impl Script {
    fn on(&self, content: &str, extraction: Extraction) {
        self.extractions.lock().insert(content.to_string(), extraction);
    }

    fn fail(&self, content: &str) {
        self.failing.lock().insert(content.to_string());
    }

    fn vector(&self, text: &str, v: &[f32]) {
        self.vectors.lock().insert(text.to_string(), v.to_vec());
    }
}

/// Replays scripted extractions; unknown content extracts nothing and
/// unknown text has no embedding.
#[derive(Clone, Default)]
struct ScriptedBackend(Arc<Script>);

#[async_trait]
impl MemoryBackend for ScriptedBackend {
    async fn extract(&self, content: &str) -> BackendResult<Extraction> {
        self.0.extracts.fetch_add(1, Ordering::SeqCst);
        if self.0.failing.lock().contains(content) {
            return Err(BackendError::Malformed("not json".into()));
        }
        Ok(self.0.extractions.lock().get(content).cloned().unwrap_or_default())
    }

    async fn embed(&self, text: &str) -> BackendResult<Vec<f32>> {
        self.0
            .vectors
            .lock()
            .get(text)
            .cloned()
            .ok_or_else(|| BackendError::Unavailable(format!("no vector for '{text}'")))
    }

    async fn summarize(&self, scope: &SummaryScope) -> BackendResult<String> {
        self.0.summaries.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} items under {}", scope.items.len(), scope.node_key))
    }
}

fn system() -> (MemorySystem<ScriptedBackend>, Arc<Script>) {
    system_with(StrataSettings::default())
}

fn system_with(settings: StrataSettings) -> (MemorySystem<ScriptedBackend>, Arc<Script>) {
    let backend = ScriptedBackend::default();
    let script = Arc::clone(&backend.0);
    (MemorySystem::in_memory(settings, backend).unwrap(), script)
}

fn inbound(content: &str) -> NewEvent {
    NewEvent::message("cli", Direction::Inbound, "s1", content)
}

fn outbound(content: &str) -> NewEvent {
    NewEvent::message("cli", Direction::Outbound, "s1", content)
}

fn entity(name: &str, entity_type: EntityType) -> ExtractedEntity {
    ExtractedEntity { name: name.into(), entity_type, description: String::new() }
}

fn preference(object: &str) -> Extraction {
    Extraction {
        entities: vec![entity("User", EntityType::Person)],
        facts: vec![ExtractedFact {
            subject: "User".into(),
            predicate: "prefers".into(),
            object: object.into(),
            object_is_entity: false,
            fact_type: FactType::Preference,
            confidence: 0.9,
            exclusive: true,
        }],
        ..Extraction::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_cycle_processes_one_batch() {
    let (memory, script) = system();
    for i in 0..25 {
        let event = memory.log_event(inbound(&format!("message {i}"))).unwrap();
        // appended events are pending straight away
        let pending = memory.layers().store.get_pending(100).unwrap();
        assert!(pending.iter().any(|e| e.id == event.id));
    }

    let report = memory.force_cycle().await;
    assert_eq!(report.outcome, CycleOutcome::Ran);
    assert_eq!(report.extracted, 20);
    let counts = memory.stats().unwrap().events;
    assert_eq!((counts.complete, counts.pending), (20, 5));
    assert_eq!(script.extracts.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn similar_names_merge_into_one_entity() {
    let (memory, script) = system();
    script.on("Lunch with Acme Corp", Extraction {
        entities: vec![entity("Acme Corp", EntityType::Org)],
        ..Extraction::default()
    });
    script.on("Acme shipped the release", Extraction {
        entities: vec![entity("Acme", EntityType::Org)],
        ..Extraction::default()
    });
    script.vector("Acme Corp", &[1.0, 0.0, 0.0]);
    script.vector("Acme", &[0.96, 0.28, 0.0]);

    memory.log_event(inbound("Lunch with Acme Corp")).unwrap();
    memory.log_event(inbound("Acme shipped the release")).unwrap();
    let report = memory.force_cycle().await;
    assert_eq!(report.extracted, 2);

    let view = memory.get_entity("acme").unwrap().unwrap();
    assert_eq!(view.entity.aliases, vec!["Acme Corp".to_string(), "Acme".to_string()]);
    assert_eq!(view.entity.mention_count, 2);
    assert_eq!(memory.stats().unwrap().entities, 1);
}

#[tokio::test]
async fn changed_preference_supersedes_and_keeps_history() {
    let (memory, script) = system();
    script.on("I like short emails", preference("short emails"));
    script.on("Actually, detailed emails please", preference("detailed emails"));

    let yesterday = Utc::now() - chrono::Duration::days(1);
    memory.log_event(inbound("I like short emails").at(yesterday)).unwrap();
    memory.log_event(inbound("Actually, detailed emails please")).unwrap();
    memory.force_cycle().await;

    let history = memory.fact_history("User", "prefers").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].object.value(), "short emails");
    assert_eq!(history[0].superseded_by.as_ref(), Some(&history[1].id));
    assert!(history[0].valid_to.is_some());
    assert!(history[1].is_active());

    let snapshot = memory.build_context(&ContextRequest::new("s1"));
    let prefs = snapshot.section(SectionKind::Preferences).unwrap();
    assert!(prefs.content.contains("User prefers detailed emails"));
    assert!(!prefs.content.contains("short emails"));
    assert!(snapshot.total_tokens <= snapshot.budget);
}

#[tokio::test]
async fn failed_extraction_is_logged_then_skipped() {
    let (logs, _guard) = strata_logging::capture_logs();
    let (memory, script) = system();
    script.fail("garbled");
    let event = memory.log_event(outbound("garbled")).unwrap();
    memory.log_event(outbound("fine")).unwrap();

    let first = memory.force_cycle().await;
    assert_eq!((first.extracted, first.failed), (1, 1));
    let warned = logs.with_field(Level::WARN, "event_id", event.id.as_str());
    assert!(warned.iter().any(|e| e.message.contains("extraction failed")));

    let second = memory.force_cycle().await;
    assert_eq!(second.skipped, 1);
    let counts = memory.stats().unwrap().events;
    assert_eq!((counts.complete, counts.skipped, counts.failed), (1, 1, 0));
}

#[tokio::test]
async fn recent_activity_defers_the_cycle() {
    let (memory, script) = system();
    memory.log_event(inbound("hello there")).unwrap();
    let before = memory.stats().unwrap().events;

    let report = memory.run_cycle().await;
    assert_eq!(report.outcome, CycleOutcome::Skipped);
    assert_eq!(memory.stats().unwrap().events, before);
    assert_eq!(script.extracts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn context_respects_budget_and_keeps_preferences() {
    let (memory, script) = system();
    script.on("I like tea", preference("tea"));
    memory.log_event(inbound("I like tea")).unwrap();
    for i in 0..30 {
        memory.log_event(outbound(&format!("reply number {i} with a few more words"))).unwrap();
    }
    memory.force_cycle().await;

    let mut previous = usize::MAX;
    for budget in [2000, 400, 250, 120, 40, 8] {
        let snapshot = memory.build_context(&ContextRequest::new("s1").budget(budget));
        assert!(snapshot.total_tokens <= budget);
        assert!(snapshot.total_tokens <= previous);
        assert_eq!(snapshot.sections[0].kind, SectionKind::Preferences);
        previous = snapshot.total_tokens;
    }

    // identical state and request, identical snapshot
    let request = ContextRequest::new("s1").budget(300).identity("You are a helpful assistant");
    assert_eq!(memory.build_context(&request), memory.build_context(&request));
}

#[test]
fn log_event_redacts_before_persisting() {
    let (memory, _) = system();
    let event = memory
        .log_event(inbound("reach me at bob@example.com, api_key=abc123secret"))
        .unwrap();
    assert_eq!(event.content, "reach me at [REDACTED:email], api_key=[REDACTED:api_key]");
    assert!(event.metadata.is_redacted());

    let stored = memory.layers().store.get_by_id(&event.id).unwrap().unwrap();
    assert_eq!(stored.content, event.content);

    let clean = memory.log_event(inbound("nothing to hide")).unwrap();
    assert!(!clean.metadata.is_redacted());
}

#[test]
fn invalid_redaction_pattern_rejected_at_open() {
    let mut settings = StrataSettings::default();
    settings.redaction.patterns = vec!["[unclosed".into()];
    let result = MemorySystem::in_memory(settings, ScriptedBackend::default());
    assert_matches!(result.err(), Some(MemoryError::Pattern(_)));
}

#[tokio::test]
async fn search_ranks_and_records_access() {
    let (memory, script) = system();
    script.on("Ship the falcon build on Friday", Extraction {
        entities: vec![entity("Falcon", EntityType::Tool)],
        ..Extraction::default()
    });
    let hit = memory.log_event(outbound("Ship the falcon build on Friday")).unwrap();
    memory.log_event(outbound("Order lunch for the team")).unwrap();
    memory.force_cycle().await;

    let hits = memory.search_memory("falcon", 10).await.unwrap();
    let kinds: Vec<HitKind> = hits.iter().map(|h| h.kind).collect();
    assert!(kinds.contains(&HitKind::Event));
    assert!(kinds.contains(&HitKind::Entity));
    assert!(hits.iter().all(|h| !h.text.contains("lunch")));

    let touched = memory.layers().store.get_by_id(&hit.id).unwrap().unwrap();
    assert!(touched.last_accessed.is_some());

    assert!(memory.search_memory("   ", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn forget_entity_and_pattern() {
    let (memory, script) = system();
    script.on("Acme hired Dana", Extraction {
        entities: vec![entity("Acme", EntityType::Org), entity("Dana", EntityType::Person)],
        facts: vec![ExtractedFact {
            subject: "Dana".into(),
            predicate: "works_at".into(),
            object: "Acme".into(),
            object_is_entity: true,
            fact_type: FactType::Relation,
            confidence: 0.8,
            exclusive: true,
        }],
        ..Extraction::default()
    });
    memory.log_event(outbound("Acme hired Dana")).unwrap();
    memory.log_event(outbound("secret project falcon notes")).unwrap();
    memory.force_cycle().await;
    let entity_id = memory.get_entity("Acme").unwrap().unwrap().entity.id;

    let report = memory.forget(&Forget::Entity("acme".into())).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(report.facts, 1);
    assert!(memory.get_entity("Acme").unwrap().is_none());
    let node = memory.layers().tree.get(&strata_summary::entity_key(&entity_id)).unwrap();
    assert!(node.is_none());

    let missing = memory.forget(&Forget::Entity("nobody".into())).unwrap();
    assert_eq!(missing.entities, 0);

    let report = memory.forget(&Forget::Pattern("falcon".into())).unwrap();
    assert_eq!(report.events, 1);
    assert_eq!(memory.stats().unwrap().events.total(), 1);

    assert_matches!(memory.forget(&Forget::Pattern("(".into())), Err(MemoryError::Store(_)));
}

#[tokio::test]
async fn forgetting_the_only_source_of_a_fact_reinstates_its_predecessor() {
    let (memory, script) = system();
    script.on("I like tea", preference("tea"));
    script.on("Now I like coffee", preference("coffee"));
    memory.log_event(outbound("I like tea")).unwrap();
    memory.force_cycle().await;
    memory.log_event(outbound("Now I like coffee")).unwrap();
    memory.force_cycle().await;
    let stats = memory.stats().unwrap();
    assert_eq!((stats.active_facts, stats.superseded_facts), (1, 1));

    let report = memory.forget(&Forget::Pattern("coffee".into())).unwrap();
    assert_eq!((report.events, report.facts), (1, 1));
    let stats = memory.stats().unwrap();
    assert_eq!((stats.active_facts, stats.superseded_facts), (1, 0));
    assert_eq!(stats.entities, 1);
}

#[tokio::test]
async fn unusable_entity_name_writes_nothing() {
    let (memory, script) = system();
    let mut extraction = preference("tea");
    extraction.entities.push(entity("???", EntityType::Concept));
    script.on("I like tea ???", extraction);
    memory.log_event(outbound("I like tea ???")).unwrap();
    memory.force_cycle().await;
    memory.force_cycle().await;

    let stats = memory.stats().unwrap();
    assert_eq!((stats.entities, stats.active_facts), (0, 0));
}

#[tokio::test]
async fn export_then_import_into_fresh_store() {
    let (memory, script) = system();
    script.on("I like tea", preference("tea"));
    memory.log_event(inbound("I like tea")).unwrap();
    memory.log_event(outbound("noted")).unwrap();
    memory.force_cycle().await;
    memory
        .record_learning(NewLearning::new("keep answers short", LearningSource::Feedback))
        .unwrap();

    let export = memory.export_all().unwrap();
    let json = serde_json::to_string(&export).unwrap();
    let parsed = serde_json::from_str(&json).unwrap();

    let (copy, _) = system();
    let first = copy.import_all(&parsed).unwrap();
    assert!(first.inserted > 0);
    let (a, b) = (memory.stats().unwrap(), copy.stats().unwrap());
    assert_eq!(a.events, b.events);
    assert_eq!(a.entities, b.entities);
    assert_eq!(a.active_facts, b.active_facts);
    assert_eq!(a.active_learnings, b.active_learnings);

    let second = copy.import_all(&parsed).unwrap();
    assert_eq!(second.inserted, 0);
}

#[test]
fn learnings_through_the_facade() {
    let (memory, _) = system();
    let old = memory
        .record_learning(NewLearning::new("answer in bullet points", LearningSource::Feedback).confidence(0.8))
        .unwrap();
    let new = memory
        .supersede_learning(&old.id, NewLearning::new("answer in short paragraphs", LearningSource::Feedback))
        .unwrap();

    let active = memory.active_learnings(10).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].learning.id, new.id);

    let snapshot = memory.build_context(&ContextRequest::new("s1"));
    let learnings = snapshot.section(SectionKind::Learnings).unwrap();
    assert!(learnings.content.contains("short paragraphs"));
}

#[tokio::test(start_paused = true)]
async fn background_task_extracts_and_shuts_down() {
    let mut settings = StrataSettings::default();
    settings.scheduler.cycle_interval_ms = 1_000;
    settings.scheduler.quiet_threshold_ms = 0;
    let (memory, _) = system_with(settings);
    for i in 0..3 {
        memory.log_event(outbound(&format!("note {i}"))).unwrap();
    }

    let handle = memory.start_background();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(memory.stats().unwrap().events.pending, 0);

    handle.shutdown(memory.shutdown_grace()).await.unwrap();
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = StrataSettings::default();
    settings.store.path = dir.path().join("memory.db").to_string_lossy().into_owned();

    {
        let memory = MemorySystem::open(settings.clone(), ScriptedBackend::default()).unwrap();
        memory.log_event(inbound("remember me")).unwrap();
    }
    let memory = MemorySystem::open(settings, ScriptedBackend::default()).unwrap();
    let recent = memory.layers().store.get_recent("s1", 5).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].content, "remember me");
}
