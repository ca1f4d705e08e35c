//! Text helpers: token estimation, deterministic truncation, and name
//! normalisation used for alias matching and literal comparison.

use std::collections::HashMap;

use crate::constants::CHARS_PER_TOKEN;

/// Estimate the token count of `text` as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Truncate `text` so that it fits in `max_tokens`.
///
/// The cut lands on the last whitespace boundary inside the character
/// allowance, so a word is never split. Returns the kept prefix and whether
/// anything was removed. The result is a pure function of its inputs.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> (String, bool) {
    if estimate_tokens(text) <= max_tokens {
        return (text.to_string(), false);
    }
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let byte_end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(i, _)| i);
    let window = &text[..byte_end];
    let cut = window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(i, _)| i);
    (window[..cut].trim_end().to_string(), true)
}

/// Normalise a name or literal for comparison: lowercase, trimmed, inner
/// whitespace collapsed, surrounding punctuation removed.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sørensen–Dice similarity over character bigrams of the normalised text.
///
/// Returns a value in `[0, 1]`; identical normalised strings score 1.0.
#[allow(clippy::cast_precision_loss)]
pub fn literal_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }
    let ba = bigrams(&a);
    let bb = bigrams(&b);
    let total: usize = ba.values().sum::<usize>() + bb.values().sum::<usize>();
    if total == 0 {
        return 0.0;
    }
    let shared: usize = ba
        .iter()
        .map(|(k, n)| bb.get(k).map_or(0, |m| (*n).min(*m)))
        .sum();
    (2 * shared) as f64 / total as f64
}

/// Whether two literals name the same value.
///
/// Tokens carrying digits (house numbers, dates, amounts) must agree
/// exactly; beyond that the literals match when [`literal_similarity`]
/// reaches `threshold`.
pub fn literals_match(a: &str, b: &str, threshold: f64) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return true;
    }
    numeric_tokens(&a) == numeric_tokens(&b) && literal_similarity(&a, &b) >= threshold
}

fn numeric_tokens(normalized: &str) -> Vec<String> {
    let mut tokens: Vec<String> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect();
    tokens.sort_unstable();
    tokens
}

fn bigrams(s: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = HashMap::new();
    for pair in chars.windows(2) {
        *out.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    out
}
