//! `RelevanceEngine`: decay and boost passes over the event log, and
//! learnings with half-life weighting.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use strata_core::{Learning, LearningId, NewLearning};
use strata_settings::RelevanceSettings;
use strata_store::repositories::event::EventRepo;
use strata_store::repositories::learning::LearningRepo;
use strata_store::{ConnectionPool, PooledConnection, Result, StoreError};
use tracing::{debug, info};

use crate::decay::{boosted_base, decay_days, decayed_score, learning_weight};

const SCORE_EPSILON: f64 = 1e-12;

/// A learning with its retrieval weight.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeightedLearning {
    /// The learning.
    pub learning: Learning,
    /// `confidence × 2^(-Δdays / half_life)` at query time.
    pub weight: f64,
}

/// The Relevance & Decay Engine.
#[derive(Clone)]
pub struct RelevanceEngine {
    pool: ConnectionPool,
    settings: RelevanceSettings,
}

impl RelevanceEngine {
    /// Create an engine over the shared pool.
    pub fn new(pool: ConnectionPool, settings: RelevanceSettings) -> Self {
        Self { pool, settings }
    }

    /// Engine settings.
    pub fn settings(&self) -> &RelevanceSettings {
        &self.settings
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    fn cutoff(&self) -> Duration {
        hours(self.settings.decay_age_cutoff_hours)
    }

    /// Recompute the score of every event older than the age cutoff from its
    /// base and whole-day age. Returns the number of scores that changed;
    /// a second call on the same day returns 0.
    pub fn apply_decay(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let changed = decay_pass(&tx, &self.settings, self.cutoff(), &now)?;
        tx.commit()?;
        if changed > 0 {
            info!(changed, "relevance decay applied");
        }
        Ok(changed)
    }

    /// Boost every event accessed inside the access window that has not been
    /// boosted for that access yet. Returns the number boosted.
    pub fn apply_boost(&self, now: DateTime<Utc>) -> Result<usize> {
        let window = hours(self.settings.access_window_hours);
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut boosted = 0;
        for row in EventRepo::relevance_unboosted_since(&tx, &(now - window))? {
            let days = decay_days(&row.timestamp, &now, self.cutoff());
            let current = decayed_score(row.base, days, &self.settings);
            let base = boosted_base(current, days, &self.settings);
            let score = decayed_score(base, days, &self.settings);
            EventRepo::set_relevance(&tx, &row.id, score, base, Some(&now))?;
            boosted += 1;
        }
        tx.commit()?;
        if boosted > 0 {
            info!(boosted, "access boost applied");
        }
        Ok(boosted)
    }

    // ── Learnings ───────────────────────────────────────────────────────

    /// Persist a new learning.
    pub fn record_learning(&self, input: NewLearning, now: DateTime<Utc>) -> Result<Learning> {
        let conn = self.conn()?;
        let learning = build_learning(input, now);
        let _ = LearningRepo::insert(&conn, &learning)?;
        debug!(learning_id = %learning.id, source = %learning.source, "learning recorded");
        Ok(learning)
    }

    /// Replace an active learning with a new one; the old one is kept for
    /// audit but drops out of retrieval.
    pub fn supersede_learning(
        &self,
        old: &LearningId,
        input: NewLearning,
        now: DateTime<Utc>,
    ) -> Result<Learning> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let active = LearningRepo::get(&tx, old)?.is_some_and(|l| l.is_active());
        if !active {
            return Err(StoreError::NotFound { kind: "active learning", id: old.to_string() });
        }
        let learning = build_learning(input, now);
        let _ = LearningRepo::insert(&tx, &learning)?;
        let _ = LearningRepo::supersede(&tx, old, &learning.id, &now)?;
        tx.commit()?;
        info!(old = %old, new = %learning.id, "learning superseded");
        Ok(learning)
    }

    /// Active learnings by weight, heaviest first (ties: newest first).
    pub fn active_learnings(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<WeightedLearning>> {
        let conn = self.conn()?;
        let half_life = self.settings.learning_half_life_days;
        let mut weighted: Vec<WeightedLearning> = LearningRepo::active(&conn)?
            .into_iter()
            .map(|learning| {
                let weight = learning_weight(learning.confidence, &learning.created_at, &now, half_life);
                WeightedLearning { learning, weight }
            })
            .collect();
        weighted.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| b.learning.created_at.cmp(&a.learning.created_at))
                .then_with(|| a.learning.id.cmp(&b.learning.id))
        });
        weighted.truncate(limit);
        Ok(weighted)
    }
}

fn hours(h: u64) -> Duration {
    i64::try_from(h)
        .ok()
        .and_then(Duration::try_hours)
        .unwrap_or_else(|| Duration::days(1))
}

fn decay_pass(
    conn: &Connection,
    settings: &RelevanceSettings,
    cutoff: Duration,
    now: &DateTime<Utc>,
) -> Result<usize> {
    let mut changed = 0;
    for row in EventRepo::relevance_older_than(conn, &(*now - cutoff))? {
        let days = decay_days(&row.timestamp, now, cutoff);
        let score = decayed_score(row.base, days, settings);
        if (score - row.score).abs() > SCORE_EPSILON {
            EventRepo::set_relevance(conn, &row.id, score, row.base, None)?;
            changed += 1;
        }
    }
    Ok(changed)
}

fn build_learning(input: NewLearning, now: DateTime<Utc>) -> Learning {
    Learning {
        id: LearningId::new(),
        content: input.content,
        source: input.source,
        sentiment: input.sentiment,
        confidence: input.confidence.clamp(0.0, 1.0),
        tool_scope: input.tool_scope,
        recommendation: input.recommendation,
        superseded_by: None,
        created_at: now,
        updated_at: now,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
