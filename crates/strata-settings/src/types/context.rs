//! Context assembly, redaction and logging settings.

use serde::{Deserialize, Serialize};

/// Context Assembler settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextSettings {
    /// Total token budget when the caller does not pass one.
    pub total_budget: usize,
    /// Per-section sub-budgets.
    pub sections: SectionBudgets,
    /// Recent events considered for the recent-activity section.
    pub recent_events: usize,
    /// Entities considered for the entities section.
    pub top_entities: usize,
    /// Topics considered for the topics section.
    pub top_topics: usize,
    /// Facts considered for the facts section.
    pub max_facts: usize,
    /// Learnings considered for the learnings section.
    pub max_learnings: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            total_budget: 2000,
            sections: SectionBudgets::default(),
            recent_events: 10,
            top_entities: 5,
            top_topics: 3,
            max_facts: 10,
            max_learnings: 5,
        }
    }
}

/// Token sub-budget per context section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionBudgets {
    /// Always-on user preferences.
    pub preferences: usize,
    /// Caller-supplied identity text.
    pub identity: usize,
    /// Recent events for the session.
    pub recent_activity: usize,
    /// Summary of the session's channel.
    pub channel_summary: usize,
    /// Active learnings.
    pub learnings: usize,
    /// Knowledge facts.
    pub facts: usize,
    /// Top relevant entities.
    pub entities: usize,
    /// Top topics.
    pub topics: usize,
}

impl Default for SectionBudgets {
    fn default() -> Self {
        Self {
            preferences: 200,
            identity: 200,
            recent_activity: 500,
            channel_summary: 300,
            learnings: 150,
            facts: 300,
            entities: 200,
            topics: 150,
        }
    }
}

impl SectionBudgets {
    /// Sum of every sub-budget.
    pub fn sum(&self) -> usize {
        self.preferences
            + self.identity
            + self.recent_activity
            + self.channel_summary
            + self.learnings
            + self.facts
            + self.entities
            + self.topics
    }
}

/// Content redaction applied before persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedactionSettings {
    /// Extra user-supplied regex patterns.
    pub patterns: Vec<String>,
    /// Redact emails, phone numbers, SSNs and card numbers.
    pub pii: bool,
    /// Redact API keys, bearer tokens and secret keys.
    pub credentials: bool,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            pii: true,
            credentials: true,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter (`RUST_LOG` takes precedence).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
