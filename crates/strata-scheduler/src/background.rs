//! Background task lifecycle.
//!
//! One tokio task ticks the scheduler on a fixed interval. After a cycle
//! whose storage access failed, the task waits out the scheduler's backoff
//! before the interval resumes. Shutdown cancels the task's token, so a
//! running cycle stops at the next item boundary, then waits up to a grace
//! period before aborting the task.

use std::sync::Arc;
use std::time::Duration;

use strata_core::MemoryBackend;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, SchedulerError};
use crate::scheduler::ExtractionScheduler;

/// Handle to the running background scheduler.
pub struct BackgroundHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl BackgroundHandle {
    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the task and wait up to `grace` for it to stop; abort it
    /// afterwards.
    pub async fn shutdown(self, grace: Duration) -> Result<()> {
        self.cancel.cancel();
        let mut join = self.join;
        if tokio::time::timeout(grace, &mut join).await.is_ok() {
            info!("background scheduler stopped");
            return Ok(());
        }
        join.abort();
        let grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        warn!(grace_ms, "background scheduler aborted");
        Err(SchedulerError::Aborted { grace_ms })
    }
}

/// Spawn the scheduler loop on the current tokio runtime.
pub fn spawn<B: MemoryBackend + 'static>(scheduler: Arc<ExtractionScheduler<B>>) -> BackgroundHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let period = Duration::from_millis(scheduler.settings().cycle_interval_ms.max(1));

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        let _ = ticker.tick().await;
        info!(interval_ms = period.as_millis(), "background scheduler started");

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let report = scheduler.cycle_until(&token).await;
                    debug!(cycle = report.cycle, outcome = ?report.outcome, "tick");
                    if let Some(delay) = scheduler.backoff() {
                        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                        warn!(delay_ms, streak = scheduler.storage_failures(), "next cycle delayed");
                        tokio::select! {
                            () = token.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }
                        ticker.reset();
                    }
                }
            }
        }
    });

    BackgroundHandle { cancel, join }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::activity::ActivityTracker;
    use crate::scheduler::Layers;
    use async_trait::async_trait;
    use strata_core::{BackendResult, Direction, Extraction, NewEvent, SummaryScope};
    use strata_graph::KnowledgeGraph;
    use strata_relevance::RelevanceEngine;
    use strata_settings::{GraphSettings, RelevanceSettings, SchedulerSettings, SummarySettings};
    use strata_store::EventStore;
    use strata_store::connection::new_in_memory;
    use strata_summary::SummaryTree;

    struct Empty;

    #[async_trait]
    impl MemoryBackend for Empty {
        async fn extract(&self, _content: &str) -> BackendResult<Extraction> {
            Ok(Extraction::default())
        }

        async fn embed(&self, _text: &str) -> BackendResult<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn summarize(&self, _scope: &SummaryScope) -> BackendResult<String> {
            Ok(String::new())
        }
    }

    fn build(settings: SchedulerSettings) -> (Arc<ExtractionScheduler<Empty>>, EventStore) {
        let pool = new_in_memory().unwrap();
        let store = EventStore::new(pool.clone());
        let layers = Layers {
            store: store.clone(),
            graph: KnowledgeGraph::new(pool.clone(), GraphSettings::default()),
            tree: SummaryTree::open(pool.clone(), SummarySettings::default()).unwrap(),
            relevance: RelevanceEngine::new(pool, RelevanceSettings::default()),
        };
        let s = ExtractionScheduler::new(layers, Arc::new(Empty), Arc::new(ActivityTracker::new()), settings);
        (Arc::new(s), store)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_then_shuts_down() {
        let (scheduler, store) = build(SchedulerSettings {
            cycle_interval_ms: 1_000,
            ..SchedulerSettings::default()
        });
        store.append(NewEvent::message("cli", Direction::Inbound, "s", "hi")).unwrap();

        let handle = spawn(scheduler.clone());
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(scheduler.runs() >= 2);
        assert_eq!(store.count_by_status().unwrap().complete, 1);

        handle.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failures_back_off_exponentially() {
        let (scheduler, store) = build(SchedulerSettings {
            cycle_interval_ms: 1_000,
            ..SchedulerSettings::default()
        });
        {
            let conn = store.pool().get().unwrap();
            conn.execute_batch("DROP TABLE events").unwrap();
        }

        let handle = spawn(scheduler.clone());
        // first tick at 1s fails; 2s backoff, then a full interval
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(scheduler.runs(), 1);
        assert_eq!(scheduler.backoff(), Some(Duration::from_millis(2_000)));
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(scheduler.runs(), 1);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(scheduler.runs(), 2);
        assert_eq!(scheduler.storage_failures(), 2);
        // second failure at 4s waits 4s more, then the interval: next run at 9s
        tokio::time::sleep(Duration::from_millis(4_000)).await;
        assert_eq!(scheduler.runs(), 2);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(scheduler.runs(), 3);

        handle.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_first_tick() {
        let (scheduler, _) = build(SchedulerSettings::default());
        let handle = spawn(scheduler.clone());
        assert!(!handle.is_finished());
        handle.shutdown(Duration::from_millis(100)).await.unwrap();
        assert_eq!(scheduler.runs(), 0);
    }
}
