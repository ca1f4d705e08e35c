//! Timestamp codec.
//!
//! Timestamps are persisted as RFC 3339 strings in UTC with millisecond
//! precision and a `Z` suffix. The fixed shape keeps lexicographic order
//! equal to chronological order, so range queries compare strings.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp for storage.
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. Unparseable values map to the Unix epoch.
pub fn from_db(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional stored timestamp.
pub fn opt_from_db(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.map(from_db)
}

/// Whole days elapsed between `from` and `to` (0 when `to` precedes `from`).
pub fn whole_days_between(from: &DateTime<Utc>, to: &DateTime<Utc>) -> u32 {
    let days = (*to - *from).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// Fractional days elapsed between `from` and `to` (0.0 when negative).
#[allow(clippy::cast_precision_loss)]
pub fn fractional_days_between(from: &DateTime<Utc>, to: &DateTime<Utc>) -> f64 {
    let ms = (*to - *from).num_milliseconds().max(0);
    ms as f64 / 86_400_000.0
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn roundtrip_preserves_millis() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap() + Duration::milliseconds(123);
        let s = to_db(&ts);
        assert_eq!(s, "2026-03-01T12:30:00.123Z");
        assert_eq!(from_db(&s), ts);
    }

    #[test]
    fn lexicographic_order_matches_time_order() {
        let a = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(to_db(&a) < to_db(&b));
    }

    #[test]
    fn garbage_maps_to_epoch() {
        assert_eq!(from_db("not a time"), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn whole_days_floor_and_clamp() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(whole_days_between(&a, &(a + Duration::hours(47))), 1);
        assert_eq!(whole_days_between(&a, &(a - Duration::days(3))), 0);
    }

    #[test]
    fn fractional_days() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let d = fractional_days_between(&a, &(a + Duration::hours(36)));
        assert!((d - 1.5).abs() < 1e-9);
    }
}
