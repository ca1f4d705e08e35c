//! Read-side views over the graph: an entity with its relations and facts,
//! and human-readable renderings used by context assembly and search.

use rusqlite::Connection;
use serde::Serialize;
use strata_core::{Edge, Entity, Fact, FactObject};
use strata_store::repositories::edge::EdgeRepo;
use strata_store::repositories::entity::EntityRepo;
use strata_store::repositories::fact::FactRepo;

use crate::errors::Result;

/// An edge with the name of the entity on the other end.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Relation {
    /// The edge.
    pub edge: Edge,
    /// Canonical name of the other endpoint.
    pub other: String,
}

/// An active fact with its object rendered as text.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FactView {
    /// The fact.
    pub fact: Fact,
    /// Literal text, or the canonical name of the object entity.
    pub object_text: String,
}

/// Everything the graph knows about one entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityView {
    /// The entity.
    pub entity: Entity,
    /// Edges leaving the entity.
    pub outgoing: Vec<Relation>,
    /// Edges arriving at the entity.
    pub incoming: Vec<Relation>,
    /// Active facts with the entity as subject.
    pub facts: Vec<FactView>,
}

/// Look an entity up by any alias (case-insensitive) and gather its view.
pub fn entity_view(conn: &Connection, name: &str) -> Result<Option<EntityView>> {
    let Some(entity) = EntityRepo::find_by_alias(conn, name)? else {
        return Ok(None);
    };
    let outgoing = EdgeRepo::outgoing(conn, &entity.id)?
        .into_iter()
        .map(|edge| {
            let other = display_name(conn, &edge.target_id)?;
            Ok(Relation { edge, other })
        })
        .collect::<Result<Vec<_>>>()?;
    let incoming = EdgeRepo::incoming(conn, &entity.id)?
        .into_iter()
        .map(|edge| {
            let other = display_name(conn, &edge.source_id)?;
            Ok(Relation { edge, other })
        })
        .collect::<Result<Vec<_>>>()?;
    let facts = FactRepo::active_for_subject(conn, &entity.id)?
        .into_iter()
        .map(|fact| fact_view(conn, fact))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(EntityView {
        entity,
        outgoing,
        incoming,
        facts,
    }))
}

/// Render a fact's object as text.
pub fn fact_view(conn: &Connection, fact: Fact) -> Result<FactView> {
    let object_text = match &fact.object {
        FactObject::Literal(text) => text.clone(),
        FactObject::Entity(id) => display_name(conn, id)?,
    };
    Ok(FactView { fact, object_text })
}

/// `subject predicate object`, with underscores in the predicate spaced out.
pub fn render_fact(conn: &Connection, fact: &Fact) -> Result<String> {
    let subject = display_name(conn, &fact.subject_id)?;
    let object = match &fact.object {
        FactObject::Literal(text) => text.clone(),
        FactObject::Entity(id) => display_name(conn, id)?,
    };
    Ok(format!("{subject} {} {object}", fact.predicate.replace('_', " ")))
}

fn display_name(conn: &Connection, id: &str) -> Result<String> {
    Ok(EntityRepo::name_of(conn, id)?.unwrap_or_else(|| id.to_string()))
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::test_support::{conn, entity};
    use crate::upsert::{EdgeInput, FactInput, upsert_edge, upsert_fact};
    use chrono::Utc;
    use strata_core::FactType;
    use strata_settings::GraphSettings;

    #[test]
    fn view_collects_relations_and_facts() {
        let conn = conn();
        let s = GraphSettings::default();
        let now = Utc::now();
        let alice = entity(&conn, "Alice");
        let acme = entity(&conn, "Acme");
        let bob = entity(&conn, "Bob");
        upsert_edge(&conn, &EdgeInput { source: &alice, target: &acme, relation: "works at", category: None }, &"evt_1".into(), &now, &s).unwrap();
        upsert_edge(&conn, &EdgeInput { source: &bob, target: &alice, relation: "manages", category: None }, &"evt_1".into(), &now, &s).unwrap();
        upsert_fact(
            &conn,
            &FactInput {
                subject: &alice,
                predicate: "employer",
                object: FactObject::Entity(acme.clone()),
                fact_type: FactType::Relation,
                confidence: 0.9,
                exclusive: true,
            },
            &"evt_1".into(),
            &now,
            &s,
        )
        .unwrap();

        let view = entity_view(&conn, "ALICE").unwrap().unwrap();
        assert_eq!(view.entity.id, alice);
        assert_eq!(view.outgoing.len(), 1);
        assert_eq!(view.outgoing[0].other, "Acme");
        assert_eq!(view.incoming[0].other, "Bob");
        assert_eq!(view.facts[0].object_text, "Acme");
        assert_eq!(render_fact(&conn, &view.facts[0].fact).unwrap(), "Alice employer Acme");

        assert!(entity_view(&conn, "nobody").unwrap().is_none());
    }
}
