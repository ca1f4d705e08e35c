//! Self-improvement records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::str_enum;
use crate::ids::LearningId;

str_enum! {
    /// Where a learning came from.
    LearningSource {
        /// Explicit user feedback.
        Feedback => "feedback",
        /// The agent's own evaluation.
        SelfEvaluation => "self_evaluation",
    }
}

str_enum! {
    /// Polarity of a learning.
    Sentiment {
        /// Something that worked.
        Positive => "positive",
        /// Something to avoid.
        Negative => "negative",
        /// Neutral observation.
        Neutral => "neutral",
    }
}

/// A persisted learning. Superseded learnings are kept for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Learning {
    /// Unique ID.
    pub id: LearningId,
    /// What was learned.
    pub content: String,
    /// Origin.
    pub source: LearningSource,
    /// Polarity.
    pub sentiment: Sentiment,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Tool the learning applies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_scope: Option<String>,
    /// Actionable recommendation.
    #[serde(default)]
    pub recommendation: String,
    /// Replacement learning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<LearningId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

impl Learning {
    /// Whether the learning takes part in retrieval.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }
}

/// Input for recording a learning.
#[derive(Clone, Debug, PartialEq)]
pub struct NewLearning {
    /// What was learned.
    pub content: String,
    /// Origin.
    pub source: LearningSource,
    /// Polarity.
    pub sentiment: Sentiment,
    /// Confidence in `[0, 1]` (clamped on record).
    pub confidence: f64,
    /// Tool scope.
    pub tool_scope: Option<String>,
    /// Actionable recommendation.
    pub recommendation: String,
}

impl NewLearning {
    /// A learning with neutral sentiment and full confidence.
    pub fn new(content: impl Into<String>, source: LearningSource) -> Self {
        Self {
            content: content.into(),
            source,
            sentiment: Sentiment::Neutral,
            confidence: 1.0,
            tool_scope: None,
            recommendation: String::new(),
        }
    }

    /// Set sentiment.
    #[must_use]
    pub fn sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = sentiment;
        self
    }

    /// Set confidence.
    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Scope to a tool.
    #[must_use]
    pub fn tool_scope(mut self, tool: impl Into<String>) -> Self {
        self.tool_scope = Some(tool.into());
        self
    }

    /// Set the recommendation.
    #[must_use]
    pub fn recommendation(mut self, text: impl Into<String>) -> Self {
        self.recommendation = text.into();
        self
    }
}
