//! Package-level constants.

/// Current version of the Strata crates (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "strata";

/// Approximate characters per token used for budget estimation.
pub const CHARS_PER_TOKEN: usize = 4;

/// Relevance score every event starts with.
pub const INITIAL_RELEVANCE: f64 = 1.0;

/// Maximum number of extraction attempts before an event is skipped.
pub const MAX_EXTRACTION_ATTEMPTS: u32 = 2;
