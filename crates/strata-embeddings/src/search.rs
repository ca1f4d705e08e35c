//! Brute-force similarity selection over in-memory candidates.

use std::cmp::Ordering;

use crate::normalize::cosine_similarity;

/// A scored candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate<T> {
    /// The item.
    pub item: T,
    /// Cosine similarity to the query.
    pub similarity: f64,
}

/// Pick the single best candidate whose similarity is at least `threshold`.
///
/// Highest similarity wins. Equal similarities are broken by `recency`
/// (larger is more recent, and wins); remaining ties keep the first
/// candidate in iteration order, so the choice is deterministic.
pub fn best_match<T, K: Ord>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (T, Vec<f32>)>,
    threshold: f64,
    recency: impl Fn(&T) -> K,
) -> Option<Candidate<T>> {
    let mut best: Option<Candidate<T>> = None;
    for (item, embedding) in candidates {
        let similarity = cosine_similarity(query, &embedding);
        if similarity < threshold {
            continue;
        }
        let better = match &best {
            None => true,
            Some(b) => match similarity.partial_cmp(&b.similarity) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => recency(&item) > recency(&b.item),
                _ => false,
            },
        };
        if better {
            best = Some(Candidate { item, similarity });
        }
    }
    best
}

/// Score every candidate and return the top `limit`, best first.
pub fn rank<T>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (T, Vec<f32>)>,
    limit: usize,
) -> Vec<Candidate<T>> {
    let mut scored: Vec<Candidate<T>> = candidates
        .into_iter()
        .map(|(item, embedding)| Candidate {
            similarity: cosine_similarity(query, &embedding),
            item,
        })
        .collect();
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(limit);
    scored
}
