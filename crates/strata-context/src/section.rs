//! Sections and deterministic fitting.

use serde::Serialize;
use strata_core::text::{estimate_tokens, truncate_to_tokens};

/// Context sections, in fill priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Always-on user preferences.
    Preferences,
    /// Caller-supplied identity text.
    Identity,
    /// Latest events of the session.
    RecentActivity,
    /// Summary of the session's channel.
    ChannelSummary,
    /// Active learnings.
    Learnings,
    /// Knowledge facts.
    Facts,
    /// Top entities.
    Entities,
    /// Largest topics.
    Topics,
}

impl SectionKind {
    /// Every section, highest priority first.
    pub const ORDER: [Self; 8] = [
        Self::Preferences,
        Self::Identity,
        Self::RecentActivity,
        Self::ChannelSummary,
        Self::Learnings,
        Self::Facts,
        Self::Entities,
        Self::Topics,
    ];

    /// Heading used when rendering.
    pub fn title(self) -> &'static str {
        match self {
            Self::Preferences => "User Preferences",
            Self::Identity => "Identity",
            Self::RecentActivity => "Recent Activity",
            Self::ChannelSummary => "Channel Summary",
            Self::Learnings => "Learnings",
            Self::Facts => "Known Facts",
            Self::Entities => "Relevant Entities",
            Self::Topics => "Topics",
        }
    }

    /// Rendered heading line.
    pub fn heading(self) -> String {
        format!("## {}\n", self.title())
    }
}

/// One filled section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Which section.
    pub kind: SectionKind,
    /// Body text (items joined by newlines).
    pub content: String,
    /// Estimated tokens of the rendered section, heading included.
    pub tokens: usize,
    /// Whether items were dropped or cut to fit.
    pub truncated: bool,
}

impl Section {
    /// Build a section from a fitted body.
    pub fn new(kind: SectionKind, content: String, truncated: bool) -> Self {
        let mut section = Self { kind, content, tokens: 0, truncated };
        section.tokens = estimate_tokens(&section.render());
        section
    }

    /// `## Title` heading, body, trailing newline.
    pub fn render(&self) -> String {
        format!("{}{}\n", self.kind.heading(), self.content)
    }
}

/// Which end of the item list survives when not everything fits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keep {
    /// Keep the leading items (ranked lists).
    Head,
    /// Keep the trailing items (chronological lists, newest last).
    Tail,
}

/// Join whole items while they fit in `budget` tokens. If not even the
/// first kept item fits, it is cut at a word boundary. Returns the body and
/// whether anything was dropped.
pub fn fit_items(items: &[String], budget: usize, keep: Keep) -> (String, bool) {
    let items: Vec<&str> = items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if items.is_empty() || budget == 0 {
        return (String::new(), !items.is_empty());
    }

    let ordered: Vec<&str> = match keep {
        Keep::Head => items.clone(),
        Keep::Tail => items.iter().rev().copied().collect(),
    };
    let mut kept: Vec<&str> = Vec::new();
    for item in &ordered {
        let mut candidate = kept.clone();
        candidate.push(item);
        if keep == Keep::Tail {
            candidate.reverse();
        }
        if estimate_tokens(&candidate.join("\n")) > budget {
            break;
        }
        kept.push(item);
    }

    if kept.is_empty() {
        let (cut, _) = truncate_to_tokens(ordered[0], budget);
        return (cut, true);
    }
    let truncated = kept.len() < items.len();
    if keep == Keep::Tail {
        kept.reverse();
    }
    (kept.join("\n"), truncated)
}
