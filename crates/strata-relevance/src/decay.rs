//! Score arithmetic.
//!
//! Every event keeps an undecayed base score. Its visible score is derived
//! from the base and its age in whole days, so recomputing it any number of
//! times within the same day yields the same value.

use chrono::{DateTime, Duration, Utc};
use strata_core::time::{fractional_days_between, whole_days_between};
use strata_settings::RelevanceSettings;

/// Days of decay that apply to an event of the given timestamp: zero while
/// it is younger than the cutoff, whole elapsed days afterwards.
pub fn decay_days(timestamp: &DateTime<Utc>, now: &DateTime<Utc>, cutoff: Duration) -> u32 {
    if *now - *timestamp < cutoff {
        0
    } else {
        whole_days_between(timestamp, now)
    }
}

/// `clamp(base × rate^days, floor, 1.0)`.
pub fn decayed_score(base: f64, days: u32, settings: &RelevanceSettings) -> f64 {
    let exponent = i32::try_from(days).unwrap_or(i32::MAX);
    let floor = settings.score_floor.clamp(0.0, 1.0);
    (base * settings.decay_rate.powi(exponent)).clamp(floor, 1.0)
}

/// The base that makes an event `days` old score `min(score × factor, 1.0)`.
///
/// The boost lifts the visible score, so it undoes earlier decay; the
/// returned base can exceed 1.0 for an old event. When `rate^days`
/// underflows the boosted score is returned unchanged as the base.
pub fn boosted_base(score: f64, days: u32, settings: &RelevanceSettings) -> f64 {
    let target = (score * settings.boost_factor).min(1.0);
    let exponent = i32::try_from(days).unwrap_or(i32::MAX);
    let divisor = settings.decay_rate.powi(exponent);
    if divisor > f64::MIN_POSITIVE { target / divisor } else { target }
}

/// `confidence × 2^(-Δdays / half_life)`.
pub fn learning_weight(
    confidence: f64,
    created_at: &DateTime<Utc>,
    now: &DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    if half_life_days <= 0.0 {
        return confidence;
    }
    let age = fractional_days_between(created_at, now);
    confidence * (-age / half_life_days).exp2()
}
