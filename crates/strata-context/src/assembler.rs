//! `ContextAssembler`: fills sections in priority order under one budget.
//!
//! Each section with content reserves `min(sub_budget, remaining)` tokens
//! and keeps whole items while they fit. Reservations depend only on the
//! budget and on which sections have content, so a tighter total only ever
//! removes content from the tail of the priority order. The assembler only
//! reads; a source that errors contributes no section.

use serde::Serialize;
use strata_core::text::estimate_tokens;
use strata_settings::ContextSettings;
use tracing::{debug, warn};

use crate::section::{Keep, Section, SectionKind, fit_items};
use crate::sources::ContextSources;

/// What to build context for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextRequest {
    /// Session whose recent activity and channel are used.
    pub session_key: String,
    /// Total budget; the configured default when `None`.
    pub budget: Option<usize>,
    /// Caller-supplied identity text.
    pub identity: Option<String>,
}

impl ContextRequest {
    /// Request for a session with the default budget.
    pub fn new(session_key: impl Into<String>) -> Self {
        Self { session_key: session_key.into(), ..Self::default() }
    }

    /// Override the total budget.
    #[must_use]
    pub fn budget(mut self, tokens: usize) -> Self {
        self.budget = Some(tokens);
        self
    }

    /// Attach identity text.
    #[must_use]
    pub fn identity(mut self, text: impl Into<String>) -> Self {
        self.identity = Some(text.into());
        self
    }
}

/// An assembled context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    /// Budget the snapshot was built for.
    pub budget: usize,
    /// Sum of section token estimates; never above `budget`.
    pub total_tokens: usize,
    /// Filled sections in priority order.
    pub sections: Vec<Section>,
}

impl ContextSnapshot {
    /// A section by kind.
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Whether any section was cut to fit.
    pub fn truncated(&self) -> bool {
        self.sections.iter().any(|s| s.truncated)
    }

    /// Markdown rendering of every section that fit. Sections are
    /// concatenated as counted, so the estimate of the result never exceeds
    /// `total_tokens`.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .filter(|s| s.tokens > 0)
            .map(Section::render)
            .collect()
    }
}

/// Builds [`ContextSnapshot`]s from a [`ContextSources`].
pub struct ContextAssembler<S> {
    sources: S,
    settings: ContextSettings,
}

impl<S: ContextSources> ContextAssembler<S> {
    /// Create an assembler.
    pub fn new(sources: S, settings: ContextSettings) -> Self {
        Self { sources, settings }
    }

    /// Assembler settings.
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Build a snapshot. Deterministic for a given store state and request.
    pub fn build(&self, request: &ContextRequest) -> ContextSnapshot {
        let budget = request.budget.unwrap_or(self.settings.total_budget);
        let mut remaining = budget;
        let mut sections = Vec::new();

        for kind in SectionKind::ORDER {
            let items = self.items(kind, request);
            if items.is_empty() && kind != SectionKind::Preferences {
                continue;
            }
            let alloc = self.sub_budget(kind).min(remaining);
            let overhead = estimate_tokens(&kind.heading()) + 1;

            remaining -= alloc;

            let section = if alloc <= overhead {
                // preferences stay listed even when nothing of them fits
                if kind != SectionKind::Preferences {
                    continue;
                }
                Section { kind, content: String::new(), tokens: 0, truncated: !items.is_empty() }
            } else {
                let keep = if kind == SectionKind::RecentActivity { Keep::Tail } else { Keep::Head };
                let (content, truncated) = fit_items(&items, alloc - overhead, keep);
                if content.is_empty() && kind != SectionKind::Preferences {
                    continue;
                }
                Section::new(kind, content, truncated)
            };
            sections.push(section);
        }

        let total_tokens = sections.iter().map(|s| s.tokens).sum();
        debug!(budget, total_tokens, sections = sections.len(), "context built");
        ContextSnapshot { budget, total_tokens, sections }
    }

    fn sub_budget(&self, kind: SectionKind) -> usize {
        let b = &self.settings.sections;
        match kind {
            SectionKind::Preferences => b.preferences,
            SectionKind::Identity => b.identity,
            SectionKind::RecentActivity => b.recent_activity,
            SectionKind::ChannelSummary => b.channel_summary,
            SectionKind::Learnings => b.learnings,
            SectionKind::Facts => b.facts,
            SectionKind::Entities => b.entities,
            SectionKind::Topics => b.topics,
        }
    }

    fn items(&self, kind: SectionKind, request: &ContextRequest) -> Vec<String> {
        let s = &self.settings;
        let session = request.session_key.as_str();
        let result = match kind {
            SectionKind::Preferences => self.sources.preferences(s.max_facts),
            SectionKind::Identity => Ok(request.identity.iter().cloned().collect()),
            SectionKind::RecentActivity => self.sources.recent_activity(session, s.recent_events),
            SectionKind::ChannelSummary => {
                self.sources.channel_summary(session).map(|o| o.into_iter().collect())
            }
            SectionKind::Learnings => self.sources.learnings(s.max_learnings),
            SectionKind::Facts => self.sources.facts(s.max_facts),
            SectionKind::Entities => self.sources.entities(s.top_entities),
            SectionKind::Topics => self.sources.topics(s.top_topics),
        };
        result.unwrap_or_else(|e| {
            warn!(section = kind.title(), error = %e, "context source failed");
            Vec::new()
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
