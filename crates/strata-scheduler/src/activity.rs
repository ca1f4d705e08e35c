//! Activity tracking.
//!
//! The interactive path records each inbound interaction; the scheduler
//! only runs once the tracker has been quiet for the configured threshold.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Timestamp of the last inbound interaction.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    last: Mutex<Option<Instant>>,
}

impl ActivityTracker {
    /// A tracker that has seen no activity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interaction now.
    pub fn record(&self) {
        *self.last.lock() = Some(Instant::now());
    }

    /// Time since the last interaction, `None` if there was none.
    pub fn idle_for(&self) -> Option<Duration> {
        self.last.lock().map(|t| t.elapsed())
    }

    /// Whether no interaction happened within `threshold`.
    pub fn is_quiet(&self, threshold: Duration) -> bool {
        self.idle_for().is_none_or(|idle| idle >= threshold)
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn quiet_after_threshold() {
        let tracker = ActivityTracker::new();
        let threshold = Duration::from_secs(60);
        assert!(tracker.is_quiet(threshold));

        tracker.record();
        assert!(!tracker.is_quiet(threshold));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!tracker.is_quiet(threshold));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(tracker.is_quiet(threshold));
        assert_eq!(tracker.idle_for(), Some(threshold));
    }
}
