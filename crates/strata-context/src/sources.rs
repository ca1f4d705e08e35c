//! Where section content comes from.
//!
//! The assembler reads through [`ContextSources`] so budgeting can be
//! exercised without a database; [`LayerSources`] is the production
//! implementation over the store, graph, summary tree and relevance engine.

use chrono::Utc;
use strata_graph::KnowledgeGraph;
use strata_relevance::RelevanceEngine;
use strata_store::EventStore;
use strata_summary::{SummaryTree, channel_key, entity_key, topic_key};

use crate::errors::Result;

/// Read-only access to every section's raw items.
pub trait ContextSources: Send + Sync {
    /// Preference summary, else rendered preference facts.
    fn preferences(&self, limit: usize) -> Result<Vec<String>>;
    /// Latest events of a session, oldest first.
    fn recent_activity(&self, session_key: &str, limit: usize) -> Result<Vec<String>>;
    /// Summary of the channel the session last used.
    fn channel_summary(&self, session_key: &str) -> Result<Option<String>>;
    /// Active learnings, heaviest first.
    fn learnings(&self, limit: usize) -> Result<Vec<String>>;
    /// Active non-preference facts, strongest first.
    fn facts(&self, limit: usize) -> Result<Vec<String>>;
    /// Most-mentioned entities.
    fn entities(&self, limit: usize) -> Result<Vec<String>>;
    /// Largest topics.
    fn topics(&self, limit: usize) -> Result<Vec<String>>;
}

/// [`ContextSources`] over the live layers.
#[derive(Clone)]
pub struct LayerSources {
    store: EventStore,
    graph: KnowledgeGraph,
    tree: SummaryTree,
    relevance: RelevanceEngine,
}

impl LayerSources {
    /// Bundle the layers.
    pub fn new(
        store: EventStore,
        graph: KnowledgeGraph,
        tree: SummaryTree,
        relevance: RelevanceEngine,
    ) -> Self {
        Self { store, graph, tree, relevance }
    }
}

impl ContextSources for LayerSources {
    fn preferences(&self, limit: usize) -> Result<Vec<String>> {
        if let Some(summary) = self.tree.preferences_text()? {
            return Ok(vec![summary]);
        }
        Ok(self.graph.preferences(limit)?)
    }

    fn recent_activity(&self, session_key: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .store
            .get_recent(session_key, limit)?
            .into_iter()
            .map(|e| format!("[{}] {}", e.direction, e.content))
            .collect())
    }

    fn channel_summary(&self, session_key: &str) -> Result<Option<String>> {
        let Some(channel) = self.store.channel_of_session(session_key)? else {
            return Ok(None);
        };
        Ok(self.tree.summary_text(&channel_key(&channel))?)
    }

    fn learnings(&self, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .relevance
            .active_learnings(Utc::now(), limit)?
            .into_iter()
            .map(|w| {
                let l = w.learning;
                if l.recommendation.is_empty() {
                    l.content
                } else {
                    format!("{} ({})", l.content, l.recommendation)
                }
            })
            .collect())
    }

    fn facts(&self, limit: usize) -> Result<Vec<String>> {
        Ok(self.graph.knowledge_facts(limit)?)
    }

    fn entities(&self, limit: usize) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entity in self.graph.top_entities(limit)? {
            let line = match self.tree.summary_text(&entity_key(&entity.id))? {
                Some(summary) => format!("{}: {summary}", entity.name),
                None if entity.description.is_empty() => {
                    format!("{} ({})", entity.name, entity.entity_type)
                }
                None => format!("{} ({}): {}", entity.name, entity.entity_type, entity.description),
            };
            out.push(line);
        }
        Ok(out)
    }

    fn topics(&self, limit: usize) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for topic in self.graph.top_topics(limit)? {
            let line = match self.tree.summary_text(&topic_key(&topic.id))? {
                Some(summary) => format!("{}: {summary}", topic.label),
                None => format!("{} ({} events)", topic.label, topic.event_count),
            };
            out.push(line);
        }
        Ok(out)
    }
}
