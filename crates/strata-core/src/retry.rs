//! Exponential backoff for work retried on a later cycle.

/// Backoff delay for the `attempt`-th consecutive failure (0-based):
/// `base × 2^attempt`, capped at `max_delay_ms`.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt() {
        assert_eq!(calculate_backoff_delay(0, 1_000, 60_000), 1_000);
        assert_eq!(calculate_backoff_delay(1, 1_000, 60_000), 2_000);
        assert_eq!(calculate_backoff_delay(3, 1_000, 60_000), 8_000);
    }

    #[test]
    fn capped_at_max() {
        assert_eq!(calculate_backoff_delay(10, 1_000, 60_000), 60_000);
        assert_eq!(calculate_backoff_delay(u32::MAX, u64::MAX, 5), 5);
    }
}
