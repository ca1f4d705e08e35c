//! Learning repository.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use strata_core::time::to_db;
use strata_core::{Learning, LearningId, LearningSource, Sentiment};

use super::{count, enum_col, ts_col};
use crate::errors::Result;

const COLUMNS: &str = "id, content, source, sentiment, confidence, tool_scope, recommendation,
     superseded_by, created_at, updated_at";

/// Learning repository.
pub struct LearningRepo;

impl LearningRepo {
    /// Insert a learning. Returns `false` if the ID already exists.
    pub fn insert(conn: &Connection, learning: &Learning) -> Result<bool> {
        let n = conn.execute(
            "INSERT INTO learnings (id, content, source, sentiment, confidence, tool_scope,
                                    recommendation, superseded_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (id) DO NOTHING",
            params![
                learning.id.as_str(),
                learning.content,
                learning.source.as_str(),
                learning.sentiment.as_str(),
                learning.confidence.clamp(0.0, 1.0),
                learning.tool_scope,
                learning.recommendation,
                learning.superseded_by.as_deref(),
                to_db(&learning.created_at),
                to_db(&learning.updated_at),
            ],
        )?;
        Ok(n > 0)
    }

    /// Get a learning by ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<Learning>> {
        let sql = format!("SELECT {COLUMNS} FROM learnings WHERE id = ?1");
        Ok(conn.query_row(&sql, [id], map_row).optional()?)
    }

    /// Mark a learning as replaced. Returns `false` if it was not active.
    pub fn supersede(
        conn: &Connection,
        id: &str,
        replacement: &str,
        at: &DateTime<Utc>,
    ) -> Result<bool> {
        let n = conn.execute(
            "UPDATE learnings SET superseded_by = ?2, updated_at = ?3
             WHERE id = ?1 AND superseded_by IS NULL",
            params![id, replacement, to_db(at)],
        )?;
        Ok(n > 0)
    }

    /// Every active learning, oldest first.
    pub fn active(conn: &Connection) -> Result<Vec<Learning>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM learnings WHERE superseded_by IS NULL
             ORDER BY created_at ASC, id ASC"
        );
        query(conn, &sql)
    }

    /// Every learning, superseded included.
    pub fn all(conn: &Connection) -> Result<Vec<Learning>> {
        let sql = format!("SELECT {COLUMNS} FROM learnings ORDER BY created_at ASC, id ASC");
        query(conn, &sql)
    }

    /// Number of active learnings.
    pub fn count_active(conn: &Connection) -> Result<u64> {
        count(conn, "SELECT COUNT(*) FROM learnings WHERE superseded_by IS NULL")
    }
}

fn query(conn: &Connection, sql: &str) -> Result<Vec<Learning>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Learning> {
    Ok(Learning {
        id: LearningId::from(row.get::<_, String>(0)?),
        content: row.get(1)?,
        source: enum_col(row, 2, LearningSource::parse)?,
        sentiment: enum_col(row, 3, Sentiment::parse)?,
        confidence: row.get(4)?,
        tool_scope: row.get(5)?,
        recommendation: row.get(6)?,
        superseded_by: row.get::<_, Option<String>>(7)?.map(LearningId::from),
        created_at: ts_col(row, 8)?,
        updated_at: ts_col(row, 9)?,
    })
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::repositories::test_support::setup;

    fn learning(content: &str) -> Learning {
        let now = Utc::now();
        Learning {
            id: LearningId::new(),
            content: content.into(),
            source: LearningSource::Feedback,
            sentiment: Sentiment::Negative,
            confidence: 0.9,
            tool_scope: Some("email".into()),
            recommendation: "keep it short".into(),
            superseded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn superseded_learnings_leave_active_set() {
        let conn = setup();
        let old = learning("too verbose");
        let new = learning("still too verbose");
        LearningRepo::insert(&conn, &old).unwrap();
        LearningRepo::insert(&conn, &new).unwrap();

        assert!(LearningRepo::supersede(&conn, &old.id, &new.id, &Utc::now()).unwrap());
        assert!(!LearningRepo::supersede(&conn, &old.id, &new.id, &Utc::now()).unwrap());

        let active = LearningRepo::active(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, new.id);
        assert_eq!(LearningRepo::all(&conn).unwrap().len(), 2);
        assert_eq!(LearningRepo::count_active(&conn).unwrap(), 1);

        let kept = LearningRepo::get(&conn, &old.id).unwrap().unwrap();
        assert_eq!(kept.superseded_by, Some(new.id.clone()));
        assert_eq!(kept.tool_scope.as_deref(), Some("email"));
    }
}
