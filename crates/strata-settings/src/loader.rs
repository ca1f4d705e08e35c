//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StrataSettings::default()`]
//! 2. If `~/.strata/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `STRATA_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::StrataSettings;

/// Resolve the path to the settings file (`~/.strata/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".strata").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<StrataSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a settings tree that
/// fails [`StrataSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<StrataSettings> {
    load_with(path, |key| std::env::var(key).ok())
}

/// Load from `path`, reading overrides through `lookup` instead of the
/// process environment.
pub fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<StrataSettings> {
    let defaults = serde_json::to_value(StrataSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: StrataSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `STRATA_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut StrataSettings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers and floats must parse and fall in range; booleans accept
/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`. Invalid values are
/// warned about and ignored.
pub fn apply_overrides(settings: &mut StrataSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = Env(&lookup);

    // ── Store ───────────────────────────────────────────────────────
    if let Some(v) = env.string("STRATA_DB_PATH") {
        settings.store.path = v;
    }

    // ── Scheduler ───────────────────────────────────────────────────
    if let Some(v) = env.parsed("STRATA_BATCH_SIZE", |s| parse_usize_range(s, 1, 10_000)) {
        settings.scheduler.batch_size = v;
    }
    if let Some(v) = env.parsed("STRATA_CYCLE_INTERVAL_MS", |s| {
        parse_u64_range(s, 100, 86_400_000)
    }) {
        settings.scheduler.cycle_interval_ms = v;
    }
    if let Some(v) = env.parsed("STRATA_QUIET_THRESHOLD_MS", |s| {
        parse_u64_range(s, 0, 86_400_000)
    }) {
        settings.scheduler.quiet_threshold_ms = v;
    }

    // ── Summary Tree ────────────────────────────────────────────────
    if let Some(v) = env.parsed("STRATA_STALENESS_THRESHOLD", |s| {
        parse_u64_range(s, 0, 1_000_000).and_then(|n| u32::try_from(n).ok())
    }) {
        settings.summary.staleness_threshold = v;
    }
    if let Some(v) = env.parsed("STRATA_MAX_REFRESH_BATCH", |s| parse_usize_range(s, 1, 1000)) {
        settings.summary.max_refresh_batch = v;
    }

    // ── Relevance ───────────────────────────────────────────────────
    if let Some(v) = env.parsed("STRATA_DECAY_RATE", parse_decay_rate) {
        settings.relevance.decay_rate = v;
    }

    // ── Context ─────────────────────────────────────────────────────
    if let Some(v) = env.parsed("STRATA_CONTEXT_BUDGET", |s| {
        parse_usize_range(s, 1, 1_000_000)
    }) {
        settings.context.total_budget = v;
    }

    // ── Redaction ───────────────────────────────────────────────────
    if let Some(v) = env.parsed("STRATA_REDACT_PII", parse_bool) {
        settings.redaction.pii = v;
    }
    if let Some(v) = env.parsed("STRATA_REDACT_CREDENTIALS", parse_bool) {
        settings.redaction.credentials = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("STRATA_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a decay rate in `(0, 1]`.
pub fn parse_decay_rate(val: &str) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (n > 0.0 && n <= 1.0).then_some(n)
}

// ── Lookup wrapper ──────────────────────────────────────────────────────────

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.0)(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env override, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        lookup(&[])
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"scheduler": {"batchSize": 20, "cycleIntervalMs": 30000}});
        let source = serde_json::json!({"scheduler": {"batchSize": 50}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["scheduler"]["batchSize"], 50);
        assert_eq!(merged["scheduler"]["cycleIntervalMs"], 30000);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"patterns": ["a", "b"]});
        let source = serde_json::json!({"patterns": ["c"]});
        assert_eq!(deep_merge(target, source)["patterns"], serde_json::json!(["c"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_with ───────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/settings.json");
        let settings = load_with(path, no_env()).unwrap();
        assert_eq!(settings, StrataSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"scheduler": {"batchSize": 5}, "context": {"sections": {"topics": 0}}}"#,
        )
        .unwrap();

        let settings = load_with(&path, no_env()).unwrap();
        assert_eq!(settings.scheduler.batch_size, 5);
        assert_eq!(settings.scheduler.cycle_interval_ms, 30_000);
        assert_eq!(settings.context.sections.topics, 0);
        assert_eq!(settings.context.sections.preferences, 200);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert_matches!(load_with(&path, no_env()), Err(SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"graph": {"entityMergeThreshold": 3.0}}"#).unwrap();
        assert_matches!(
            load_with(&path, no_env()),
            Err(SettingsError::InvalidValue(_))
        );
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut s = StrataSettings::default();
        apply_overrides(
            &mut s,
            lookup(&[
                ("STRATA_DB_PATH", "/tmp/x.db"),
                ("STRATA_BATCH_SIZE", "7"),
                ("STRATA_CYCLE_INTERVAL_MS", "1000"),
                ("STRATA_QUIET_THRESHOLD_MS", "0"),
                ("STRATA_STALENESS_THRESHOLD", "2"),
                ("STRATA_MAX_REFRESH_BATCH", "9"),
                ("STRATA_DECAY_RATE", "0.5"),
                ("STRATA_CONTEXT_BUDGET", "300"),
                ("STRATA_REDACT_PII", "off"),
                ("STRATA_REDACT_CREDENTIALS", "no"),
                ("STRATA_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(s.store.path, "/tmp/x.db");
        assert_eq!(s.scheduler.batch_size, 7);
        assert_eq!(s.scheduler.cycle_interval_ms, 1000);
        assert_eq!(s.scheduler.quiet_threshold_ms, 0);
        assert_eq!(s.summary.staleness_threshold, 2);
        assert_eq!(s.summary.max_refresh_batch, 9);
        assert!((s.relevance.decay_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(s.context.total_budget, 300);
        assert!(!s.redaction.pii);
        assert!(!s.redaction.credentials);
        assert_eq!(s.logging.level, "debug");
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut s = StrataSettings::default();
        apply_overrides(
            &mut s,
            lookup(&[
                ("STRATA_BATCH_SIZE", "0"),
                ("STRATA_DECAY_RATE", "1.5"),
                ("STRATA_REDACT_PII", "maybe"),
                ("STRATA_DB_PATH", ""),
            ]),
        );
        assert_eq!(s, StrataSettings::default());
    }

    #[test]
    fn env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"scheduler": {"batchSize": 5}}"#).unwrap();
        let s = load_with(&path, lookup(&[("STRATA_BATCH_SIZE", "11")])).unwrap();
        assert_eq!(s.scheduler.batch_size, 11);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "ON"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "No", "off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u64_range("1000", 1000, 2000), Some(1000));
        assert_eq!(parse_u64_range("999", 1000, 2000), None);
        assert_eq!(parse_usize_range("abc", 1, 10), None);
        assert_eq!(parse_decay_rate("0"), None);
        assert_eq!(parse_decay_rate("1"), Some(1.0));
    }
}
