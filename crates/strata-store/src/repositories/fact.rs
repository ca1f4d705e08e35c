//! Fact repository: subject-predicate-object assertions with a supersession
//! chain. Superseded facts are never deleted by the graph layer; they stay
//! queryable through [`FactRepo::history`]. Only forgetting removes facts.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use strata_core::time::to_db;
use strata_core::{EntityId, EventId, Fact, FactId, FactObject, FactType};

use super::{count, enum_col, id_list, opt_ts_col, sql_limit, ts_col};
use crate::errors::Result;

const COLUMNS: &str = "id, subject_id, predicate, object_kind, object_value, fact_type, confidence,
     strength, exclusive, valid_from, valid_to, superseded_by, created_at, updated_at";

/// Fact repository.
pub struct FactRepo;

impl FactRepo {
    /// Insert a new fact with its event links.
    pub fn insert(conn: &Connection, fact: &Fact) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO facts (id, subject_id, predicate, object_kind, object_value, fact_type,
                                confidence, strength, exclusive, valid_from, valid_to,
                                superseded_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                fact.id.as_str(),
                fact.subject_id.as_str(),
                fact.predicate,
                fact.object.kind(),
                fact.object.value(),
                fact.fact_type.as_str(),
                fact.confidence.clamp(0.0, 1.0),
                fact.strength,
                fact.exclusive,
                to_db(&fact.valid_from),
                fact.valid_to.as_ref().map(to_db),
                fact.superseded_by.as_deref(),
                to_db(&fact.created_at),
                to_db(&fact.updated_at),
            ],
        )?;
        for event_id in &fact.event_ids {
            Self::link_event(conn, &fact.id, event_id)?;
        }
        Ok(())
    }

    /// Get a fact by ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<Fact>> {
        let sql = format!("SELECT {COLUMNS} FROM facts WHERE id = ?1");
        let row = conn.query_row(&sql, [id], map_row).optional()?;
        row.map(|f| hydrate(conn, f)).transpose()
    }

    /// Active facts for a `(subject, predicate)` pair, oldest first.
    ///
    /// At most one of them is exclusive.
    pub fn active_for(conn: &Connection, subject_id: &str, predicate: &str) -> Result<Vec<Fact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM facts
             WHERE subject_id = ?1 AND predicate = ?2 AND superseded_by IS NULL
             ORDER BY created_at ASC, id ASC"
        );
        query(conn, &sql, params![subject_id, predicate])
    }

    /// Close a fact: point it at its replacement and end its validity.
    ///
    /// Must run before the replacement is inserted, so the one-active
    /// index never sees two active exclusive facts.
    pub fn supersede(
        conn: &Connection,
        id: &str,
        replacement: &str,
        at: &DateTime<Utc>,
    ) -> Result<bool> {
        let n = conn.execute(
            "UPDATE facts SET superseded_by = ?2, valid_to = ?3, updated_at = ?3
             WHERE id = ?1 AND superseded_by IS NULL",
            params![id, replacement, to_db(at)],
        )?;
        Ok(n > 0)
    }

    /// Re-assertion of an existing fact: store the merged confidence and
    /// bump the strength counter.
    pub fn strengthen(
        conn: &Connection,
        id: &str,
        confidence: f64,
        at: &DateTime<Utc>,
    ) -> Result<()> {
        let _ = conn.execute(
            "UPDATE facts SET strength = strength + 1, confidence = ?2, updated_at = ?3
             WHERE id = ?1",
            params![id, confidence.clamp(0.0, 1.0), to_db(at)],
        )?;
        Ok(())
    }

    /// Link a contributing event.
    pub fn link_event(conn: &Connection, id: &str, event_id: &str) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO fact_events (fact_id, event_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![id, event_id],
        )?;
        Ok(())
    }

    /// Distinct facts with a contributing link to any of `event_ids`.
    pub fn sourced_from(conn: &Connection, event_ids: &[EventId]) -> Result<Vec<FactId>> {
        let mut stmt = conn.prepare_cached("SELECT fact_id FROM fact_events WHERE event_id = ?1")?;
        let mut out: Vec<FactId> = Vec::new();
        for event_id in event_ids {
            let rows = stmt.query_map([event_id.as_str()], |row| row.get::<_, String>(0))?;
            for row in rows {
                let id = FactId::from(row?);
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    /// Delete those of `candidates` that have no contributing event left.
    ///
    /// The supersession chain is kept intact: a predecessor of a deleted
    /// fact is pointed at the next surviving successor, or reinstated as
    /// active when the deleted fact was the end of the chain. Returns rows
    /// deleted.
    pub fn delete_unsourced(conn: &Connection, candidates: &[FactId]) -> Result<usize> {
        let mut orphans = Vec::new();
        for id in candidates {
            if let Some(fact) = Self::get(conn, id)? {
                if fact.event_ids.is_empty() {
                    orphans.push(fact);
                }
            }
        }
        let next: HashMap<&str, Option<&FactId>> = orphans
            .iter()
            .map(|f| (f.id.as_str(), f.superseded_by.as_ref()))
            .collect();
        let doomed: HashSet<&str> = next.keys().copied().collect();

        let mut deleted = 0;
        for fact in &orphans {
            deleted += conn.execute("DELETE FROM facts WHERE id = ?1", [fact.id.as_str()])?;
        }
        for fact in &orphans {
            let mut successor = fact.superseded_by.as_ref();
            while let Some(id) = successor.filter(|id| doomed.contains(id.as_str())) {
                successor = next.get(id.as_str()).copied().flatten();
            }
            let _ = conn.execute(
                "UPDATE facts
                 SET superseded_by = ?2, valid_to = CASE WHEN ?2 IS NULL THEN NULL ELSE valid_to END
                 WHERE superseded_by = ?1",
                params![fact.id.as_str(), successor.map(FactId::as_str)],
            )?;
        }
        Ok(deleted)
    }

    /// Every version of a `(subject, predicate)` pair, oldest first.
    pub fn history(conn: &Connection, subject_id: &str, predicate: &str) -> Result<Vec<Fact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM facts WHERE subject_id = ?1 AND predicate = ?2
             ORDER BY created_at ASC, id ASC"
        );
        query(conn, &sql, params![subject_id, predicate])
    }

    /// Active facts about an entity, most confident first.
    pub fn active_for_subject(conn: &Connection, subject_id: &str) -> Result<Vec<Fact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM facts WHERE subject_id = ?1 AND superseded_by IS NULL
             ORDER BY confidence DESC, strength DESC, updated_at DESC, id ASC"
        );
        query(conn, &sql, [subject_id])
    }

    /// Active facts of one type, strongest first.
    pub fn active_of_type(conn: &Connection, fact_type: FactType, limit: usize) -> Result<Vec<Fact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM facts WHERE fact_type = ?1 AND superseded_by IS NULL
             ORDER BY confidence DESC, strength DESC, updated_at DESC, id ASC LIMIT ?2"
        );
        query(conn, &sql, params![fact_type.as_str(), sql_limit(limit)])
    }

    /// Active facts of any type except `excluded`, strongest first.
    pub fn active_top(conn: &Connection, excluded: FactType, limit: usize) -> Result<Vec<Fact>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM facts WHERE fact_type != ?1 AND superseded_by IS NULL
             ORDER BY confidence DESC, strength DESC, updated_at DESC, id ASC LIMIT ?2"
        );
        query(conn, &sql, params![excluded.as_str(), sql_limit(limit)])
    }

    /// Every fact, oldest first.
    pub fn all(conn: &Connection) -> Result<Vec<Fact>> {
        let sql = format!("SELECT {COLUMNS} FROM facts ORDER BY created_at ASC, id ASC");
        query(conn, &sql, [])
    }

    /// Delete every fact that mentions an entity as subject or object.
    /// Returns rows deleted.
    pub fn delete_for_entity(conn: &Connection, entity_id: &str) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM facts
             WHERE subject_id = ?1 OR (object_kind = 'entity' AND object_value = ?1)",
            [entity_id],
        )?)
    }

    /// Number of active facts.
    pub fn count_active(conn: &Connection) -> Result<u64> {
        count(conn, "SELECT COUNT(*) FROM facts WHERE superseded_by IS NULL")
    }

    /// Number of facts, superseded included.
    pub fn count(conn: &Connection) -> Result<u64> {
        count(conn, "SELECT COUNT(*) FROM facts")
    }
}

fn query(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Fact>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params, map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(|f| hydrate(conn, f)).collect()
}

fn hydrate(conn: &Connection, mut fact: Fact) -> Result<Fact> {
    fact.event_ids = id_list::<EventId>(
        conn,
        "SELECT event_id FROM fact_events WHERE fact_id = ?1 ORDER BY rowid ASC",
        &fact.id,
    )?;
    Ok(fact)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Fact> {
    let kind: String = row.get(3)?;
    Ok(Fact {
        id: FactId::from(row.get::<_, String>(0)?),
        subject_id: EntityId::from(row.get::<_, String>(1)?),
        predicate: row.get(2)?,
        object: FactObject::from_parts(&kind, row.get(4)?),
        fact_type: enum_col(row, 5, FactType::parse)?,
        confidence: row.get(6)?,
        strength: row.get(7)?,
        exclusive: row.get(8)?,
        event_ids: Vec::new(),
        valid_from: ts_col(row, 9)?,
        valid_to: opt_ts_col(row, 10)?,
        superseded_by: row.get::<_, Option<String>>(11)?.map(FactId::from),
        created_at: ts_col(row, 12)?,
        updated_at: ts_col(row, 13)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::repositories::test_support::{entity, setup};
    use chrono::Duration;

    fn fact(subject: &str, predicate: &str, object: &str, at: DateTime<Utc>) -> Fact {
        Fact {
            id: FactId::new(),
            subject_id: subject.into(),
            predicate: predicate.into(),
            object: FactObject::Literal(object.into()),
            fact_type: FactType::Preference,
            confidence: 0.8,
            strength: 1,
            exclusive: true,
            event_ids: vec![EventId::from("evt_1")],
            valid_from: at,
            valid_to: None,
            superseded_by: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn supersession_chain_is_kept() {
        let conn = setup();
        let user = entity(&conn, "User");
        let t0 = Utc::now();
        let old = fact(&user, "prefers", "short emails", t0);
        FactRepo::insert(&conn, &old).unwrap();

        let t1 = t0 + Duration::days(1);
        let new = fact(&user, "prefers", "detailed emails", t1);
        assert!(FactRepo::supersede(&conn, &old.id, &new.id, &t1).unwrap());
        FactRepo::insert(&conn, &new).unwrap();

        let active = FactRepo::active_for(&conn, &user, "prefers").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, new.id);

        let history = FactRepo::history(&conn, &user, "prefers").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].superseded_by.as_ref(), Some(&new.id));
        assert!(history[0].valid_to.is_some());
        assert_eq!(FactRepo::count_active(&conn).unwrap(), 1);
        assert_eq!(FactRepo::count(&conn).unwrap(), 2);
    }

    #[test]
    fn non_exclusive_facts_coexist() {
        let conn = setup();
        let user = entity(&conn, "User");
        let mut a = fact(&user, "speaks", "english", Utc::now());
        a.exclusive = false;
        let mut b = fact(&user, "speaks", "french", Utc::now());
        b.exclusive = false;
        FactRepo::insert(&conn, &a).unwrap();
        FactRepo::insert(&conn, &b).unwrap();
        assert_eq!(FactRepo::active_for(&conn, &user, "speaks").unwrap().len(), 2);
    }

    #[test]
    fn strengthen_bumps_counter() {
        let conn = setup();
        let user = entity(&conn, "User");
        let f = fact(&user, "prefers", "tea", Utc::now());
        FactRepo::insert(&conn, &f).unwrap();
        FactRepo::strengthen(&conn, &f.id, 0.9, &Utc::now()).unwrap();
        FactRepo::link_event(&conn, &f.id, "evt_2").unwrap();
        let got = FactRepo::get(&conn, &f.id).unwrap().unwrap();
        assert_eq!(got.strength, 2);
        assert!((got.confidence - 0.9).abs() < 1e-9);
        assert_eq!(got.event_ids.len(), 2);
    }

    #[test]
    fn entity_objects_round_trip_and_delete() {
        let conn = setup();
        let alice = entity(&conn, "Alice");
        let acme = entity(&conn, "Acme");
        let mut f = fact(&alice, "works_at", "", Utc::now());
        f.object = FactObject::Entity(EntityId::from(acme.as_str()));
        f.fact_type = FactType::Relation;
        FactRepo::insert(&conn, &f).unwrap();

        let got = FactRepo::get(&conn, &f.id).unwrap().unwrap();
        assert_eq!(got.object, FactObject::Entity(EntityId::from(acme.as_str())));
        assert_eq!(FactRepo::delete_for_entity(&conn, &acme).unwrap(), 1);
    }

    #[test]
    fn deleting_chain_end_reinstates_predecessor() {
        let conn = setup();
        let user = entity(&conn, "User");
        let t0 = Utc::now();
        let old = fact(&user, "lives_in", "Lisbon", t0);
        FactRepo::insert(&conn, &old).unwrap();
        let t1 = t0 + Duration::days(1);
        let mut new = fact(&user, "lives_in", "Porto", t1);
        new.event_ids = vec![EventId::from("evt_2")];
        FactRepo::supersede(&conn, &old.id, &new.id, &t1).unwrap();
        FactRepo::insert(&conn, &new).unwrap();

        let sourced = FactRepo::sourced_from(&conn, &[EventId::from("evt_2")]).unwrap();
        assert_eq!(sourced, vec![new.id.clone()]);
        conn.execute("DELETE FROM fact_events WHERE event_id = 'evt_2'", []).unwrap();
        assert_eq!(FactRepo::delete_unsourced(&conn, &sourced).unwrap(), 1);

        let active = FactRepo::active_for(&conn, &user, "lives_in").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, old.id);
        assert!(active[0].valid_to.is_none());
    }

    #[test]
    fn deleting_mid_chain_skips_to_survivor() {
        let conn = setup();
        let user = entity(&conn, "User");
        let t0 = Utc::now();
        let a = fact(&user, "drinks", "tea", t0);
        let mut b = fact(&user, "drinks", "coffee", t0 + Duration::days(1));
        b.event_ids = vec![EventId::from("evt_2")];
        let mut c = fact(&user, "drinks", "water", t0 + Duration::days(2));
        c.event_ids = vec![EventId::from("evt_3")];
        FactRepo::insert(&conn, &a).unwrap();
        FactRepo::supersede(&conn, &a.id, &b.id, &b.valid_from).unwrap();
        FactRepo::insert(&conn, &b).unwrap();
        FactRepo::supersede(&conn, &b.id, &c.id, &c.valid_from).unwrap();
        FactRepo::insert(&conn, &c).unwrap();

        conn.execute("DELETE FROM fact_events WHERE event_id = 'evt_2'", []).unwrap();
        assert_eq!(FactRepo::delete_unsourced(&conn, &[b.id.clone(), c.id.clone()]).unwrap(), 1);

        let history = FactRepo::history(&conn, &user, "drinks").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].superseded_by.as_ref(), Some(&c.id));
        assert!(history[0].valid_to.is_some());
        assert_eq!(FactRepo::active_for(&conn, &user, "drinks").unwrap()[0].id, c.id);
    }

    #[test]
    fn typed_listings() {
        let conn = setup();
        let user = entity(&conn, "User");
        FactRepo::insert(&conn, &fact(&user, "prefers", "tea", Utc::now())).unwrap();
        let mut attr = fact(&user, "lives_in", "Lisbon", Utc::now());
        attr.fact_type = FactType::Attribute;
        FactRepo::insert(&conn, &attr).unwrap();

        assert_eq!(FactRepo::active_of_type(&conn, FactType::Preference, 10).unwrap().len(), 1);
        let others = FactRepo::active_top(&conn, FactType::Preference, 10).unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].predicate, "lives_in");
        assert_eq!(FactRepo::active_for_subject(&conn, &user).unwrap().len(), 2);
    }
}
