//! Event repository: the append-only interaction log.
//!
//! Content, channel, kind and metadata are written once by [`EventRepo::insert`]
//! and never updated. The only mutations are extraction bookkeeping
//! (`extraction_status`, `extraction_attempts`) and relevance bookkeeping
//! (`relevance_score`, `relevance_base`, `last_accessed`, `boosted_at`).

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use strata_core::constants::MAX_EXTRACTION_ATTEMPTS;
use strata_core::time::to_db;
use strata_core::{Direction, Event, EventId, EventKind, ExtractionStatus};

use super::{blob, enum_col, json_col, opt_ts_col, sql_limit, ts_col, vec_col};
use crate::errors::Result;

const COLUMNS: &str = "id, seq, timestamp, channel, direction, kind, content, embedding,
     session_key, parent_id, subject_entity_id, extraction_status, extraction_attempts,
     metadata, relevance_score, last_accessed, checksum";

/// Count of events per extraction status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    /// Waiting for extraction.
    pub pending: u64,
    /// Extracted.
    pub complete: u64,
    /// Permanently skipped.
    pub skipped: u64,
    /// Failed once, awaiting retry.
    pub failed: u64,
}

impl StatusCounts {
    /// Total number of events.
    pub fn total(&self) -> u64 {
        self.pending + self.complete + self.skipped + self.failed
    }
}

/// Relevance bookkeeping for one event.
#[derive(Clone, Debug, PartialEq)]
pub struct RelevanceRow {
    /// Event ID.
    pub id: EventId,
    /// Event timestamp (age origin).
    pub timestamp: DateTime<Utc>,
    /// Undecayed score.
    pub base: f64,
    /// Current (decayed) score.
    pub score: f64,
    /// Last access.
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Event repository. Stateless, every method takes `&Connection`.
pub struct EventRepo;

impl EventRepo {
    /// Insert an event. Returns the assigned sequence number.
    pub fn insert(conn: &Connection, event: &Event, relevance_base: f64) -> Result<i64> {
        let metadata = serde_json::to_string(&event.metadata)?;
        let _ = conn.execute(
            "INSERT INTO events (id, timestamp, channel, direction, kind, content, embedding,
                 session_key, parent_id, subject_entity_id, extraction_status, extraction_attempts,
                 metadata, relevance_score, relevance_base, last_accessed, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                event.id.as_str(),
                to_db(&event.timestamp),
                event.channel,
                event.direction.as_str(),
                event.kind.as_str(),
                event.content,
                blob(event.embedding.as_ref()),
                event.session_key,
                event.parent_id.as_deref(),
                event.subject_entity_id.as_deref(),
                event.extraction_status.as_str(),
                event.extraction_attempts,
                metadata,
                event.relevance_score,
                relevance_base,
                event.last_accessed.as_ref().map(to_db),
                event.checksum,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Whether an event with this ID exists.
    pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
        let found = conn
            .query_row("SELECT 1 FROM events WHERE id = ?1", [id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Get a single event by ID.
    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Event>> {
        let sql = format!("SELECT {COLUMNS} FROM events WHERE id = ?1");
        Ok(conn.query_row(&sql, [id], map_row).optional()?)
    }

    /// Events eligible for extraction, in append order: every `pending`
    /// event plus `failed` events that still have a retry left.
    pub fn pending(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events
             WHERE extraction_status = 'pending'
                OR (extraction_status = 'failed' AND extraction_attempts < ?2)
             ORDER BY seq ASC LIMIT ?1"
        );
        query(conn, &sql, params![sql_limit(limit), MAX_EXTRACTION_ATTEMPTS])
    }

    /// Record an extraction attempt and its outcome. Returns whether the
    /// event existed.
    pub fn set_status(conn: &Connection, id: &str, status: ExtractionStatus) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE events
             SET extraction_status = ?2, extraction_attempts = extraction_attempts + 1
             WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// The latest `limit` events of a session, oldest first.
    pub fn recent(conn: &Connection, session_key: &str, limit: usize) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events WHERE session_key = ?1 ORDER BY seq DESC LIMIT ?2"
        );
        let mut events = query(conn, &sql, params![session_key, sql_limit(limit)])?;
        events.reverse();
        Ok(events)
    }

    /// The latest `limit` events of a channel, oldest first.
    pub fn recent_in_channel(conn: &Connection, channel: &str, limit: usize) -> Result<Vec<Event>> {
        let sql =
            format!("SELECT {COLUMNS} FROM events WHERE channel = ?1 ORDER BY seq DESC LIMIT ?2");
        let mut events = query(conn, &sql, params![channel, sql_limit(limit)])?;
        events.reverse();
        Ok(events)
    }

    /// The most recent session key seen on a channel.
    pub fn channel_of_session(conn: &Connection, session_key: &str) -> Result<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT channel FROM events WHERE session_key = ?1 ORDER BY seq DESC LIMIT 1",
                [session_key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Events with a timestamp before `cutoff`, in append order.
    pub fn older_than(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<Vec<Event>> {
        let sql = format!("SELECT {COLUMNS} FROM events WHERE timestamp < ?1 ORDER BY seq ASC");
        query(conn, &sql, params![to_db(cutoff)])
    }

    /// Events accessed at or after `since`, in append order.
    pub fn accessed_since(conn: &Connection, since: &DateTime<Utc>) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events WHERE last_accessed >= ?1 ORDER BY seq ASC"
        );
        query(conn, &sql, params![to_db(since)])
    }

    /// Events by ID, in append order. Unknown IDs are ignored.
    pub fn get_many(conn: &Connection, ids: &[EventId]) -> Result<Vec<Event>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(ev) = Self::get_by_id(conn, id)? {
                out.push(ev);
            }
        }
        out.sort_by_key(|e| e.sequence);
        Ok(out)
    }

    /// Highest-relevance events, for search ranking.
    pub fn search_candidates(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events ORDER BY relevance_score DESC, seq DESC LIMIT ?1"
        );
        query(conn, &sql, params![sql_limit(limit)])
    }

    /// Set `last_accessed` on the given events. Returns rows touched.
    pub fn touch(conn: &Connection, ids: &[EventId], at: &DateTime<Utc>) -> Result<usize> {
        let mut stmt = conn.prepare_cached("UPDATE events SET last_accessed = ?2 WHERE id = ?1")?;
        let at = to_db(at);
        let mut touched = 0;
        for id in ids {
            touched += stmt.execute(params![id.as_str(), at])?;
        }
        Ok(touched)
    }

    /// Count events per extraction status.
    pub fn count_by_status(conn: &Connection) -> Result<StatusCounts> {
        let mut stmt = conn.prepare_cached(
            "SELECT extraction_status, COUNT(*) FROM events GROUP BY extraction_status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row?;
            let n = u64::try_from(n).unwrap_or(0);
            match ExtractionStatus::parse(&status) {
                Some(ExtractionStatus::Pending) => counts.pending = n,
                Some(ExtractionStatus::Complete) => counts.complete = n,
                Some(ExtractionStatus::Skipped) => counts.skipped = n,
                Some(ExtractionStatus::Failed) => counts.failed = n,
                None => {}
            }
        }
        Ok(counts)
    }

    /// IDs of events whose content matches `pattern`.
    pub fn matching_ids(conn: &Connection, pattern: &Regex) -> Result<Vec<EventId>> {
        let mut stmt = conn.prepare_cached("SELECT id, content FROM events ORDER BY seq ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut ids = Vec::new();
        for row in rows {
            let (id, content) = row?;
            if pattern.is_match(&content) {
                ids.push(EventId::from(id));
            }
        }
        Ok(ids)
    }

    /// Delete events and every graph link naming them; topic links
    /// cascade. Returns events deleted.
    pub fn delete(conn: &Connection, ids: &[EventId]) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            for sql in [
                "DELETE FROM entity_events WHERE event_id = ?1",
                "DELETE FROM edge_events WHERE event_id = ?1",
                "DELETE FROM fact_events WHERE event_id = ?1",
            ] {
                let _ = conn.prepare_cached(sql)?.execute([id.as_str()])?;
            }
            deleted += conn.prepare_cached("DELETE FROM events WHERE id = ?1")?.execute([id.as_str()])?;
        }
        Ok(deleted)
    }

    /// Every event with its undecayed base score, in append order.
    pub fn all_with_base(conn: &Connection) -> Result<Vec<(Event, f64)>> {
        let sql = format!("SELECT {COLUMNS}, relevance_base FROM events ORDER BY seq ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((map_row(row)?, row.get::<_, f64>(17)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Relevance bookkeeping ───────────────────────────────────────────

    /// Relevance rows for events older than `cutoff`.
    pub fn relevance_older_than(
        conn: &Connection,
        cutoff: &DateTime<Utc>,
    ) -> Result<Vec<RelevanceRow>> {
        relevance_query(
            conn,
            "SELECT id, timestamp, relevance_base, relevance_score, last_accessed
             FROM events WHERE timestamp < ?1 ORDER BY seq ASC",
            &to_db(cutoff),
        )
    }

    /// Relevance rows for events accessed at or after `since` and not yet
    /// boosted for that access.
    pub fn relevance_unboosted_since(
        conn: &Connection,
        since: &DateTime<Utc>,
    ) -> Result<Vec<RelevanceRow>> {
        relevance_query(
            conn,
            "SELECT id, timestamp, relevance_base, relevance_score, last_accessed
             FROM events
             WHERE last_accessed >= ?1 AND (boosted_at IS NULL OR boosted_at < last_accessed)
             ORDER BY seq ASC",
            &to_db(since),
        )
    }

    /// Store a recomputed score (and optionally base and boost marker).
    pub fn set_relevance(
        conn: &Connection,
        id: &str,
        score: f64,
        base: f64,
        boosted_at: Option<&DateTime<Utc>>,
    ) -> Result<()> {
        let _ = conn.execute(
            "UPDATE events
             SET relevance_score = ?2, relevance_base = ?3, boosted_at = COALESCE(?4, boosted_at)
             WHERE id = ?1",
            params![id, score, base, boosted_at.map(to_db)],
        )?;
        Ok(())
    }
}

fn query(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params, map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn relevance_query(conn: &Connection, sql: &str, arg: &str) -> Result<Vec<RelevanceRow>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map([arg], |row| {
            Ok(RelevanceRow {
                id: EventId::from(row.get::<_, String>(0)?),
                timestamp: ts_col(row, 1)?,
                base: row.get(2)?,
                score: row.get(3)?,
                last_accessed: opt_ts_col(row, 4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: EventId::from(row.get::<_, String>(0)?),
        sequence: row.get(1)?,
        timestamp: ts_col(row, 2)?,
        channel: row.get(3)?,
        direction: enum_col(row, 4, Direction::parse)?,
        kind: enum_col(row, 5, EventKind::parse)?,
        content: row.get(6)?,
        embedding: vec_col(row, 7)?,
        session_key: row.get(8)?,
        parent_id: row.get::<_, Option<String>>(9)?.map(EventId::from),
        subject_entity_id: row.get::<_, Option<String>>(10)?.map(Into::into),
        extraction_status: enum_col(row, 11, ExtractionStatus::parse)?,
        extraction_attempts: row.get(12)?,
        metadata: json_col(row, 13)?,
        relevance_score: row.get(14)?,
        last_accessed: opt_ts_col(row, 15)?,
        checksum: row.get(16)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::repositories::test_support::setup;
    use chrono::Duration;
    use strata_core::EventMetadata;

    fn event(session: &str, content: &str, ts: DateTime<Utc>) -> Event {
        Event {
            id: EventId::new(),
            sequence: 0,
            timestamp: ts,
            channel: "telegram".into(),
            direction: Direction::Inbound,
            kind: EventKind::Message,
            content: content.into(),
            embedding: Some(vec![0.5, 0.25]),
            session_key: session.into(),
            parent_id: None,
            subject_entity_id: None,
            extraction_status: ExtractionStatus::Pending,
            extraction_attempts: 0,
            metadata: EventMetadata::new().with_str("source", "test").unwrap(),
            relevance_score: 1.0,
            last_accessed: None,
            checksum: "abc".into(),
        }
    }

    fn insert(conn: &Connection, ev: &Event) -> i64 {
        EventRepo::insert(conn, ev, 1.0).unwrap()
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let conn = setup();
        let ev = event("s1", "hello", Utc::now());
        let seq = insert(&conn, &ev);
        let got = EventRepo::get_by_id(&conn, &ev.id).unwrap().unwrap();
        assert_eq!(got.sequence, seq);
        assert_eq!(got.content, "hello");
        assert_eq!(got.embedding, Some(vec![0.5, 0.25]));
        assert_eq!(got.metadata.get_str("source"), Some("test"));
        assert!(EventRepo::exists(&conn, &ev.id).unwrap());
        assert!(EventRepo::get_by_id(&conn, "evt_missing").unwrap().is_none());
    }

    #[test]
    fn sequence_is_monotonic() {
        let conn = setup();
        let a = insert(&conn, &event("s", "a", Utc::now()));
        let b = insert(&conn, &event("s", "b", Utc::now()));
        assert!(b > a);
    }

    #[test]
    fn pending_is_fifo_and_limited() {
        let conn = setup();
        let evs: Vec<Event> = (0..5).map(|i| event("s", &format!("m{i}"), Utc::now())).collect();
        for ev in &evs {
            insert(&conn, ev);
        }
        let got = EventRepo::pending(&conn, 3).unwrap();
        let contents: Vec<_> = got.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn failed_events_are_retried_once() {
        let conn = setup();
        let ev = event("s", "x", Utc::now());
        insert(&conn, &ev);

        assert!(EventRepo::set_status(&conn, &ev.id, ExtractionStatus::Failed).unwrap());
        let retry = EventRepo::pending(&conn, 10).unwrap();
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].extraction_attempts, 1);

        // a second failed attempt exhausts the retry budget
        EventRepo::set_status(&conn, &ev.id, ExtractionStatus::Failed).unwrap();
        assert!(EventRepo::pending(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn status_counts() {
        let conn = setup();
        let a = event("s", "a", Utc::now());
        let b = event("s", "b", Utc::now());
        insert(&conn, &a);
        insert(&conn, &b);
        EventRepo::set_status(&conn, &a.id, ExtractionStatus::Complete).unwrap();
        let counts = EventRepo::count_by_status(&conn).unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.complete, 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn recent_returns_latest_oldest_first() {
        let conn = setup();
        for i in 0..4 {
            insert(&conn, &event("s1", &format!("m{i}"), Utc::now()));
        }
        insert(&conn, &event("s2", "other", Utc::now()));
        let got = EventRepo::recent(&conn, "s1", 2).unwrap();
        let contents: Vec<_> = got.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);
        assert_eq!(
            EventRepo::channel_of_session(&conn, "s2").unwrap().as_deref(),
            Some("telegram")
        );
    }

    #[test]
    fn older_than_and_accessed_since() {
        let conn = setup();
        let now = Utc::now();
        let old = event("s", "old", now - Duration::days(3));
        let new = event("s", "new", now);
        insert(&conn, &old);
        insert(&conn, &new);

        let got = EventRepo::older_than(&conn, &(now - Duration::days(1))).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, old.id);

        assert_eq!(EventRepo::touch(&conn, &[new.id.clone()], &now).unwrap(), 1);
        let got = EventRepo::accessed_since(&conn, &(now - Duration::hours(1))).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, new.id);
    }

    #[test]
    fn unboosted_filter_respects_boost_marker() {
        let conn = setup();
        let now = Utc::now();
        let ev = event("s", "x", now);
        insert(&conn, &ev);
        EventRepo::touch(&conn, &[ev.id.clone()], &now).unwrap();

        let since = now - Duration::hours(1);
        assert_eq!(EventRepo::relevance_unboosted_since(&conn, &since).unwrap().len(), 1);
        EventRepo::set_relevance(&conn, &ev.id, 1.0, 1.0, Some(&now)).unwrap();
        assert!(EventRepo::relevance_unboosted_since(&conn, &since).unwrap().is_empty());
    }

    #[test]
    fn matching_and_delete() {
        let conn = setup();
        let a = event("s", "my card is 4111", Utc::now());
        let b = event("s", "nothing here", Utc::now());
        insert(&conn, &a);
        insert(&conn, &b);
        let re = Regex::new(r"\d{4}").unwrap();
        let ids = EventRepo::matching_ids(&conn, &re).unwrap();
        assert_eq!(ids, vec![a.id.clone()]);
        assert_eq!(EventRepo::delete(&conn, &ids).unwrap(), 1);
        assert!(!EventRepo::exists(&conn, &a.id).unwrap());
    }

    #[test]
    fn all_with_base_reports_base() {
        let conn = setup();
        let ev = event("s", "x", Utc::now());
        EventRepo::insert(&conn, &ev, 0.7).unwrap();
        let all = EventRepo::all_with_base(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert!((all[0].1 - 0.7).abs() < f64::EPSILON);
    }
}
