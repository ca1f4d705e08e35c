//! Scoped material for a node refresh.
//!
//! Each node type summarises a different slice of the store: recent events
//! for a channel, facts and relations for an entity, linked events for a
//! topic, child summaries for the structural nodes.

use rusqlite::Connection;
use strata_core::{EventId, FactType, NodeType, SummaryNode, SummaryScope};
use strata_graph::view::render_fact;
use strata_store::repositories::edge::EdgeRepo;
use strata_store::repositories::entity::EntityRepo;
use strata_store::repositories::event::EventRepo;
use strata_store::repositories::fact::FactRepo;
use strata_store::repositories::summary::SummaryRepo;
use strata_store::repositories::topic::TopicRepo;

use crate::errors::Result;
use crate::keys::parse_key;

/// Collect up to `max_items` scoped items for `node`.
pub fn gather(conn: &Connection, node: &SummaryNode, max_items: usize) -> Result<SummaryScope> {
    let id = parse_key(&node.key).map_or("", |(_, id)| id);
    let mut items = match node.node_type {
        NodeType::Root | NodeType::EntityType => child_summaries(conn, &node.key)?,
        NodeType::Preferences => FactRepo::active_of_type(conn, FactType::Preference, max_items)?
            .iter()
            .map(|f| render_fact(conn, f))
            .collect::<strata_graph::Result<Vec<_>>>()?,
        NodeType::Channel => EventRepo::recent_in_channel(conn, id, max_items)?
            .into_iter()
            .filter(|e| !e.content.trim().is_empty())
            .map(|e| format!("[{}] {}", e.direction, e.content))
            .collect(),
        NodeType::Entity => entity_items(conn, id, max_items)?,
        NodeType::Topic => topic_items(conn, id, max_items)?,
    };
    items.truncate(max_items);
    Ok(SummaryScope {
        node_key: node.key.clone(),
        node_type: node.node_type,
        previous_summary: node.summary.clone(),
        items,
    })
}

/// `key: summary` for refreshed children; an entity child that was never
/// refreshed contributes its name instead.
fn child_summaries(conn: &Connection, key: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for child in SummaryRepo::children(conn, key)? {
        if !child.summary.is_empty() {
            out.push(format!("{}: {}", child.key, child.summary));
        } else if let Some((NodeType::Entity, id)) = parse_key(&child.key) {
            if let Some(name) = EntityRepo::name_of(conn, id)? {
                out.push(name);
            }
        }
    }
    Ok(out)
}

fn entity_items(conn: &Connection, entity_id: &str, max_items: usize) -> Result<Vec<String>> {
    let Some(entity) = EntityRepo::get(conn, entity_id)? else {
        return Ok(Vec::new());
    };
    let mut items = vec![format!("{} ({})", entity.name, entity.entity_type)];
    if !entity.description.is_empty() {
        items.push(entity.description.clone());
    }
    if entity.aliases.len() > 1 {
        items.push(format!("also known as {}", entity.aliases.join(", ")));
    }
    for fact in FactRepo::active_for_subject(conn, entity_id)? {
        items.push(render_fact(conn, &fact)?);
    }
    for edge in EdgeRepo::outgoing(conn, entity_id)? {
        let target = EntityRepo::name_of(conn, &edge.target_id)?.unwrap_or_else(|| edge.target_id.to_string());
        items.push(format!("{} {} {target}", entity.name, edge.relation.replace('_', " ")));
    }
    items.extend(recent_contents(conn, &entity.event_ids, max_items)?);
    Ok(items)
}

fn topic_items(conn: &Connection, topic_id: &str, max_items: usize) -> Result<Vec<String>> {
    let Some(topic) = TopicRepo::get(conn, topic_id)? else {
        return Ok(Vec::new());
    };
    let mut items = vec![format!("topic: {}", topic.label)];
    let ids = TopicRepo::event_ids(conn, topic_id)?;
    items.extend(recent_contents(conn, &ids, max_items)?);
    Ok(items)
}

/// Contents of the newest `limit` events among `ids`, oldest first.
fn recent_contents(conn: &Connection, ids: &[EventId], limit: usize) -> Result<Vec<String>> {
    let tail = &ids[ids.len().saturating_sub(limit)..];
    Ok(EventRepo::get_many(conn, tail)?
        .into_iter()
        .map(|e| e.content)
        .filter(|c| !c.trim().is_empty())
        .collect())
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::staleness::{ensure_channel, ensure_entity, ensure_permanent};
    use crate::test_support::conn;
    use chrono::Utc;
    use strata_core::{Direction, EntityType, Event, ExtractionStatus, NewEvent};
    use strata_graph::upsert::{FactInput, upsert_fact};
    use strata_graph::{Candidate, resolver};
    use strata_settings::GraphSettings;

    fn append(conn: &Connection, channel: &str, content: &str, seq: i64) -> Event {
        let new = NewEvent::message(channel, Direction::Inbound, "s", content);
        let event = Event {
            id: EventId::new(),
            sequence: seq,
            timestamp: Utc::now(),
            channel: new.channel,
            direction: new.direction,
            kind: new.kind,
            content: new.content,
            embedding: None,
            session_key: new.session_key,
            parent_id: None,
            subject_entity_id: None,
            extraction_status: ExtractionStatus::Pending,
            extraction_attempts: 0,
            metadata: new.metadata,
            relevance_score: 1.0,
            last_accessed: None,
            checksum: String::new(),
        };
        EventRepo::insert(conn, &event, 1.0).unwrap();
        event
    }

    fn node(conn: &Connection, key: &str) -> SummaryNode {
        SummaryRepo::get(conn, key).unwrap().unwrap()
    }

    #[test]
    fn channel_scope_is_recent_events_in_order() {
        let conn = conn();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            append(&conn, "cli", text, i as i64);
        }
        append(&conn, "other", "elsewhere", 9);
        let key = ensure_channel(&conn, "cli").unwrap();

        let scope = gather(&conn, &node(&conn, &key), 2).unwrap();
        assert_eq!(scope.items, vec!["[inbound] two".to_string(), "[inbound] three".to_string()]);
        assert_eq!(scope.node_type, NodeType::Channel);
    }

    #[test]
    fn preferences_scope_renders_facts() {
        let conn = conn();
        ensure_permanent(&conn).unwrap();
        let ev = append(&conn, "cli", "I prefer tea", 1);
        let s = GraphSettings::default();
        let user = resolver::resolve(
            &conn,
            &Candidate { name: "User", entity_type: EntityType::Person, description: "", embedding: None },
            &ev.id,
            &Utc::now(),
            &s,
        )
        .unwrap();
        upsert_fact(
            &conn,
            &FactInput {
                subject: &user.entity_id,
                predicate: "prefers",
                object: strata_core::FactObject::Literal("tea".into()),
                fact_type: FactType::Preference,
                confidence: 0.9,
                exclusive: true,
            },
            &ev.id,
            &Utc::now(),
            &s,
        )
        .unwrap();

        let scope = gather(&conn, &node(&conn, crate::keys::PREFERENCES_KEY), 10).unwrap();
        assert_eq!(scope.items, vec!["User prefers tea".to_string()]);

        let key = ensure_entity(&conn, &user.entity_id, EntityType::Person).unwrap();
        let entity_scope = gather(&conn, &node(&conn, &key), 10).unwrap();
        assert_eq!(entity_scope.items[0], "User (person)");
        assert!(entity_scope.items.contains(&"User prefers tea".to_string()));
        assert!(entity_scope.items.contains(&"I prefer tea".to_string()));

        // the type node lists its never-refreshed child by name
        let type_scope = gather(&conn, &node(&conn, "entity_type:person"), 10).unwrap();
        assert_eq!(type_scope.items, vec!["User".to_string()]);
    }
}
