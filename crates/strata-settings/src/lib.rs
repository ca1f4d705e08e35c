//! # strata-settings
//!
//! Layered configuration for the Strata memory subsystem.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`StrataSettings::default()`]
//! 2. **User file**: `~/.strata/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `STRATA_*` overrides (highest priority)
//!
//! There is no global instance. The loaded value is immutable and handed to
//! each component at construction.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    load_with, settings_path,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = StrataSettings::default();
        assert!(settings_path().ends_with(".strata/settings.json"));
    }
}
