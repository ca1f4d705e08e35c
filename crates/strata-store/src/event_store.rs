//! High-level `EventStore` API over the append-only log.
//!
//! Appends are synchronous and never wait on extraction. Status updates from
//! the background task touch a disjoint set of columns, so the two actors
//! never race on the same field.

use chrono::{Duration, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use strata_core::{Event, EventId, ExtractionStatus, NewEvent};
use tracing::{debug, info};

use crate::connection::{ConnectionPool, PooledConnection};
use crate::errors::Result;
use crate::repositories::event::{EventRepo, StatusCounts};
use crate::repositories::fact::FactRepo;
use crate::repositories::topic::TopicRepo;

/// What forgetting by pattern removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForgottenEvents {
    /// Events deleted.
    pub events: usize,
    /// Facts deleted because every contributing event was forgotten.
    pub facts: usize,
}

/// Append-only event log backed by the shared connection pool.
#[derive(Clone)]
pub struct EventStore {
    pool: ConnectionPool,
}

impl EventStore {
    /// Create a new `EventStore` with the given connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// The underlying pool, shared with the other layers.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Append an event with status `pending` and full relevance.
    ///
    /// Fails only on invalid reserved metadata or storage errors.
    pub fn append(&self, new: NewEvent) -> Result<Event> {
        new.metadata.validate()?;
        let timestamp = new.timestamp.unwrap_or_else(Utc::now);
        let checksum = checksum(&new, &timestamp);
        let mut event = Event {
            id: EventId::new(),
            sequence: 0,
            timestamp,
            channel: new.channel,
            direction: new.direction,
            kind: new.kind,
            content: new.content,
            embedding: new.embedding,
            session_key: new.session_key,
            parent_id: new.parent_id,
            subject_entity_id: new.subject_entity_id,
            extraction_status: ExtractionStatus::Pending,
            extraction_attempts: 0,
            metadata: new.metadata,
            relevance_score: Event::INITIAL_RELEVANCE,
            last_accessed: None,
            checksum,
        };
        let conn = self.conn()?;
        event.sequence = EventRepo::insert(&conn, &event, Event::INITIAL_RELEVANCE)?;
        debug!(event_id = %event.id, seq = event.sequence, channel = %event.channel, "event appended");
        Ok(event)
    }

    /// Get an event by ID.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Event>> {
        let conn = self.conn()?;
        EventRepo::get_by_id(&conn, id)
    }

    /// Up to `limit` events awaiting extraction, oldest first. Includes
    /// failed events that still have their single retry.
    pub fn get_pending(&self, limit: usize) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        EventRepo::pending(&conn, limit)
    }

    /// Record the outcome of an extraction attempt.
    pub fn mark_extracted(&self, id: &str, status: ExtractionStatus) -> Result<bool> {
        let conn = self.conn()?;
        EventRepo::set_status(&conn, id, status)
    }

    /// The latest `limit` events of a session, oldest first.
    pub fn get_recent(&self, session_key: &str, limit: usize) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        EventRepo::recent(&conn, session_key, limit)
    }

    /// The latest `limit` events on a channel, oldest first.
    pub fn get_recent_in_channel(&self, channel: &str, limit: usize) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        EventRepo::recent_in_channel(&conn, channel, limit)
    }

    /// Channel a session was last seen on.
    pub fn channel_of_session(&self, session_key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        EventRepo::channel_of_session(&conn, session_key)
    }

    /// Events older than `age`.
    pub fn get_old(&self, age: Duration) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        EventRepo::older_than(&conn, &(Utc::now() - age))
    }

    /// Events accessed within `window`.
    pub fn get_recently_accessed(&self, window: Duration) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        EventRepo::accessed_since(&conn, &(Utc::now() - window))
    }

    /// Record that the given events were read by a caller.
    pub fn touch(&self, ids: &[EventId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let n = EventRepo::touch(&tx, ids, &Utc::now())?;
        tx.commit()?;
        Ok(n)
    }

    /// Count events per extraction status.
    pub fn count_by_status(&self) -> Result<StatusCounts> {
        let conn = self.conn()?;
        EventRepo::count_by_status(&conn)
    }

    /// Forget every event whose content matches `pattern`.
    ///
    /// Graph links naming those events are pruned, and facts left with no
    /// contributing event are deleted. Entities and edges stay, since they
    /// are removed by name rather than by content.
    pub fn delete_matching(&self, pattern: &str) -> Result<ForgottenEvents> {
        let re = Regex::new(pattern)?;
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let ids = EventRepo::matching_ids(&tx, &re)?;
        let sourced = FactRepo::sourced_from(&tx, &ids)?;
        let events = EventRepo::delete(&tx, &ids)?;
        let facts = FactRepo::delete_unsourced(&tx, &sourced)?;
        if events > 0 {
            TopicRepo::recount(&tx)?;
        }
        tx.commit()?;
        info!(pattern, events, facts, "events forgotten");
        Ok(ForgottenEvents { events, facts })
    }
}

/// SHA-256 over the immutable fields of an event, hex encoded.
fn checksum(new: &NewEvent, timestamp: &chrono::DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    for part in [
        new.channel.as_str(),
        new.direction.as_str(),
        new.kind.as_str(),
        new.session_key.as_str(),
        &strata_core::time::to_db(timestamp),
        new.content.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
