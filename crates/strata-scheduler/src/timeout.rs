//! Time-bounded backend calls.

use std::time::Duration;

use async_trait::async_trait;
use strata_core::{BackendError, BackendResult, Extraction, MemoryBackend, SummaryScope};

/// Wraps a backend so every call fails with [`BackendError::Timeout`] once
/// `limit` elapses.
pub struct TimeoutBackend<B> {
    inner: B,
    limit: Duration,
}

impl<B: MemoryBackend> TimeoutBackend<B> {
    /// Bound every call on `inner` by `limit`.
    pub fn new(inner: B, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn elapsed(&self, operation: &'static str) -> BackendError {
        BackendError::Timeout {
            operation,
            after_ms: u64::try_from(self.limit.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[async_trait]
impl<B: MemoryBackend> MemoryBackend for TimeoutBackend<B> {
    async fn extract(&self, content: &str) -> BackendResult<Extraction> {
        tokio::time::timeout(self.limit, self.inner.extract(content))
            .await
            .map_err(|_| self.elapsed("extract"))?
    }

    async fn embed(&self, text: &str) -> BackendResult<Vec<f32>> {
        tokio::time::timeout(self.limit, self.inner.embed(text))
            .await
            .map_err(|_| self.elapsed("embed"))?
    }

    async fn summarize(&self, scope: &SummaryScope) -> BackendResult<String> {
        tokio::time::timeout(self.limit, self.inner.summarize(scope))
            .await
            .map_err(|_| self.elapsed("summarize"))?
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Slow;

    #[async_trait]
    impl MemoryBackend for Slow {
        async fn extract(&self, _content: &str) -> BackendResult<Extraction> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Extraction::default())
        }

        async fn embed(&self, _text: &str) -> BackendResult<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn summarize(&self, _scope: &SummaryScope) -> BackendResult<String> {
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let backend = TimeoutBackend::new(Slow, Duration::from_secs(5));
        assert_matches!(
            backend.extract("x").await,
            Err(BackendError::Timeout { operation: "extract", after_ms: 5000 })
        );
        assert_eq!(backend.embed("x").await.unwrap(), vec![1.0]);
    }
}
