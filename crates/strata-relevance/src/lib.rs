//! # strata-relevance
//!
//! Relevance & Decay Engine of the Strata memory subsystem.
//!
//! - **Decay**: each event's score is `clamp(base × rate^days, floor, 1.0)`,
//!   recomputed from an undecayed base so repeated passes within one day
//!   change nothing
//! - **Access boost**: events read through search have their current score
//!   multiplied by the boost factor (capped at 1.0), once per access; the
//!   base is rescaled so later decay continues from the boosted score
//! - **Learnings**: self-improvement records ranked by
//!   `confidence × 2^(-Δdays / half_life)`; superseded ones are kept for
//!   audit and excluded from ranking

#![deny(unsafe_code)]

pub mod decay;
pub mod engine;

pub use decay::{boosted_base, decay_days, decayed_score, learning_weight};
pub use engine::{RelevanceEngine, WeightedLearning};
