//! # strata-embeddings
//!
//! Vector plumbing shared by the Knowledge Graph, Summary Tree and search:
//! little-endian f32 BLOB codec for `SQLite`, L2 normalisation, cosine
//! similarity, centroid running means, and best-match selection with a
//! deterministic tie-break. Producing embeddings is the backend's job.

#![deny(unsafe_code)]

pub mod blob;
pub mod centroid;
pub mod normalize;
pub mod search;

pub use blob::{BlobError, blob_to_f32_vec, f32_slice_to_blob};
pub use centroid::running_mean;
pub use normalize::{cosine_similarity, l2_norm, l2_normalize};
pub use search::{Candidate, best_match, rank};
