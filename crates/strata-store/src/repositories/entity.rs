//! Entity repository: canonical entities, their aliases and mention links.
//!
//! Alias keys are normalised surface forms and globally unique, so an alias
//! can never point at two entities.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use strata_core::text::normalize;
use strata_core::time::to_db;
use strata_core::{Entity, EntityId, EntityType, EventId};

use super::{blob, count, enum_col, id_list, sql_limit, ts_col, vec_col};
use crate::errors::Result;

const COLUMNS: &str =
    "id, name, entity_type, description, name_embedding, mention_count, first_seen, last_seen";

/// Entity repository. Stateless: every method takes a `&Connection`, so
/// callers choose between a pooled connection and an open transaction.
pub struct EntityRepo;

impl EntityRepo {
    /// Insert a new entity with its aliases and event links.
    ///
    /// Aliases already owned by another entity are left with their owner.
    pub fn insert(conn: &Connection, entity: &Entity) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO entities (id, name, name_key, entity_type, description, name_embedding,
                                   mention_count, first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entity.id.as_str(),
                entity.name,
                normalize(&entity.name),
                entity.entity_type.as_str(),
                entity.description,
                blob(entity.name_embedding.as_ref()),
                entity.mention_count,
                to_db(&entity.first_seen),
                to_db(&entity.last_seen),
            ],
        )?;
        let _ = Self::add_alias(conn, &entity.id, &entity.name)?;
        for alias in &entity.aliases {
            let _ = Self::add_alias(conn, &entity.id, alias)?;
        }
        for event_id in &entity.event_ids {
            Self::link_event(conn, &entity.id, event_id)?;
        }
        Ok(())
    }

    /// Get an entity by ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<Entity>> {
        let sql = format!("SELECT {COLUMNS} FROM entities WHERE id = ?1");
        let row = conn.query_row(&sql, [id], map_row).optional()?;
        row.map(|e| hydrate(conn, e)).transpose()
    }

    /// Find the entity owning an alias (case- and whitespace-insensitive).
    pub fn find_by_alias(conn: &Connection, alias: &str) -> Result<Option<Entity>> {
        let key = normalize(alias);
        if key.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {COLUMNS} FROM entities
             WHERE id = (SELECT entity_id FROM entity_aliases WHERE alias_key = ?1)"
        );
        let row = conn.query_row(&sql, [key], map_row).optional()?;
        row.map(|e| hydrate(conn, e)).transpose()
    }

    /// Find an entity by canonical name and type.
    pub fn find_by_name(
        conn: &Connection,
        name: &str,
        entity_type: EntityType,
    ) -> Result<Option<Entity>> {
        let sql = format!("SELECT {COLUMNS} FROM entities WHERE name_key = ?1 AND entity_type = ?2");
        let row = conn
            .query_row(&sql, params![normalize(name), entity_type.as_str()], map_row)
            .optional()?;
        row.map(|e| hydrate(conn, e)).transpose()
    }

    /// Entities of one type that carry a name embedding, as
    /// `(id, last_seen, embedding)` triples for similarity matching.
    pub fn embeddings_of_type(
        conn: &Connection,
        entity_type: EntityType,
    ) -> Result<Vec<(EntityId, DateTime<Utc>, Vec<f32>)>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, last_seen, name_embedding FROM entities
             WHERE entity_type = ?1 AND name_embedding IS NOT NULL
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([entity_type.as_str()], |row| {
            Ok((
                EntityId::from(row.get::<_, String>(0)?),
                ts_col(row, 1)?,
                vec_col(row, 2)?.unwrap_or_default(),
            ))
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Attach an alias. Returns `false` if the alias is already taken.
    pub fn add_alias(conn: &Connection, id: &str, alias: &str) -> Result<bool> {
        let key = normalize(alias);
        if key.is_empty() {
            return Ok(false);
        }
        let inserted = conn.execute(
            "INSERT INTO entity_aliases (alias_key, alias, entity_id) VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
            params![key, alias.trim(), id],
        )?;
        Ok(inserted > 0)
    }

    /// Record one more mention: bump the counter, extend `last_seen` and
    /// link the event. A repeated event does not count twice.
    pub fn record_mention(
        conn: &Connection,
        id: &str,
        event_id: &str,
        at: &DateTime<Utc>,
    ) -> Result<bool> {
        let linked = conn.execute(
            "INSERT INTO entity_events (entity_id, event_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![id, event_id],
        )?;
        if linked == 0 {
            return Ok(false);
        }
        let _ = conn.execute(
            "UPDATE entities
             SET mention_count = mention_count + 1, last_seen = MAX(last_seen, ?2)
             WHERE id = ?1",
            params![id, to_db(at)],
        )?;
        Ok(true)
    }

    /// Link a contributing event without counting a mention.
    pub fn link_event(conn: &Connection, id: &str, event_id: &str) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO entity_events (entity_id, event_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![id, event_id],
        )?;
        Ok(())
    }

    /// Fill in the description if it is still empty.
    pub fn fill_description(conn: &Connection, id: &str, description: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Ok(());
        }
        let _ = conn.execute(
            "UPDATE entities SET description = ?2 WHERE id = ?1 AND description = ''",
            params![id, description.trim()],
        )?;
        Ok(())
    }

    /// Most-mentioned entities, most recently seen first on ties.
    pub fn top(conn: &Connection, limit: usize) -> Result<Vec<Entity>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM entities
             ORDER BY mention_count DESC, last_seen DESC, id ASC LIMIT ?1"
        );
        query(conn, &sql, params![sql_limit(limit)])
    }

    /// Every entity, oldest first.
    pub fn all(conn: &Connection) -> Result<Vec<Entity>> {
        let sql = format!("SELECT {COLUMNS} FROM entities ORDER BY first_seen ASC, id ASC");
        query(conn, &sql, [])
    }

    /// Canonical name of an entity.
    pub fn name_of(conn: &Connection, id: &str) -> Result<Option<String>> {
        Ok(conn
            .query_row("SELECT name FROM entities WHERE id = ?1", [id], |row| row.get(0))
            .optional()?)
    }

    /// Delete an entity. Aliases, links, edges and subject facts cascade.
    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        Ok(conn.execute("DELETE FROM entities WHERE id = ?1", [id])? > 0)
    }

    /// Number of entities.
    pub fn count(conn: &Connection) -> Result<u64> {
        count(conn, "SELECT COUNT(*) FROM entities")
    }
}

fn query(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params, map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(|e| hydrate(conn, e)).collect()
}

fn hydrate(conn: &Connection, mut entity: Entity) -> Result<Entity> {
    entity.aliases = id_list(
        conn,
        "SELECT alias FROM entity_aliases WHERE entity_id = ?1 ORDER BY rowid ASC",
        &entity.id,
    )?;
    entity.event_ids = id_list::<EventId>(
        conn,
        "SELECT event_id FROM entity_events WHERE entity_id = ?1 ORDER BY rowid ASC",
        &entity.id,
    )?;
    Ok(entity)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: EntityId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        entity_type: enum_col(row, 2, EntityType::parse)?,
        aliases: Vec::new(),
        description: row.get(3)?,
        name_embedding: vec_col(row, 4)?,
        event_ids: Vec::new(),
        mention_count: row.get(5)?,
        first_seen: ts_col(row, 6)?,
        last_seen: ts_col(row, 7)?,
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

    fn entity(name: &str, entity_type: EntityType) -> Entity {
        let now = Utc::now();
        Entity {
            id: EntityId::new(),
            name: name.into(),
            entity_type,
            aliases: vec![],
            description: String::new(),
            name_embedding: Some(vec![1.0, 0.0]),
            event_ids: vec![EventId::from("evt_1")],
            mention_count: 1,
            first_seen: now,
            last_seen: now,
        }
    }

    #[test]
    fn insert_registers_canonical_alias() {
        let conn = setup();
        let e = entity("Acme Corp", EntityType::Org);
        EntityRepo::insert(&conn, &e).unwrap();

        let got = EntityRepo::find_by_alias(&conn, "  acme   CORP ").unwrap().unwrap();
        assert_eq!(got.id, e.id);
        assert_eq!(got.aliases, vec!["Acme Corp".to_string()]);
        assert_eq!(got.event_ids, vec![EventId::from("evt_1")]);
    }

    #[test]
    fn alias_cannot_belong_to_two_entities() {
        let conn = setup();
        let a = entity("Acme", EntityType::Org);
        let b = entity("Beta", EntityType::Org);
        EntityRepo::insert(&conn, &a).unwrap();
        EntityRepo::insert(&conn, &b).unwrap();

        assert!(!EntityRepo::add_alias(&conn, &b.id, "ACME").unwrap());
        let owner = EntityRepo::find_by_alias(&conn, "acme").unwrap().unwrap();
        assert_eq!(owner.id, a.id);
    }

    #[test]
    fn mention_is_counted_once_per_event() {
        let conn = setup();
        let e = entity("Alice", EntityType::Person);
        EntityRepo::insert(&conn, &e).unwrap();

        let later = Utc::now() + chrono::Duration::hours(1);
        assert!(EntityRepo::record_mention(&conn, &e.id, "evt_2", &later).unwrap());
        assert!(!EntityRepo::record_mention(&conn, &e.id, "evt_2", &later).unwrap());

        let got = EntityRepo::get(&conn, &e.id).unwrap().unwrap();
        assert_eq!(got.mention_count, 2);
        assert_eq!(got.event_ids.len(), 2);
        assert_eq!(got.last_seen.timestamp(), later.timestamp());
    }

    #[test]
    fn embeddings_filtered_by_type() {
        let conn = setup();
        EntityRepo::insert(&conn, &entity("Acme", EntityType::Org)).unwrap();
        EntityRepo::insert(&conn, &entity("Rust", EntityType::Tool)).unwrap();
        let mut no_vec = entity("Globex", EntityType::Org);
        no_vec.name_embedding = None;
        EntityRepo::insert(&conn, &no_vec).unwrap();

        let orgs = EntityRepo::embeddings_of_type(&conn, EntityType::Org).unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].2, vec![1.0, 0.0]);
    }

    #[test]
    fn top_orders_by_mentions() {
        let conn = setup();
        let a = entity("A", EntityType::Concept);
        let mut b = entity("B", EntityType::Concept);
        b.mention_count = 5;
        EntityRepo::insert(&conn, &a).unwrap();
        EntityRepo::insert(&conn, &b).unwrap();
        let top = EntityRepo::top(&conn, 1).unwrap();
        assert_eq!(top[0].id, b.id);
        assert_eq!(EntityRepo::count(&conn).unwrap(), 2);
    }

    #[test]
    fn delete_cascades_aliases() {
        let conn = setup();
        let e = entity("Alice", EntityType::Person);
        EntityRepo::insert(&conn, &e).unwrap();
        assert!(EntityRepo::delete(&conn, &e.id).unwrap());
        assert!(EntityRepo::find_by_alias(&conn, "alice").unwrap().is_none());
    }

    #[test]
    fn description_filled_once() {
        let conn = setup();
        let e = entity("Alice", EntityType::Person);
        EntityRepo::insert(&conn, &e).unwrap();
        EntityRepo::fill_description(&conn, &e.id, "engineer").unwrap();
        EntityRepo::fill_description(&conn, &e.id, "manager").unwrap();
        let got = EntityRepo::get(&conn, &e.id).unwrap().unwrap();
        assert_eq!(got.description, "engineer");
    }
}
