//! Prefix completion over a space's vocabulary.
//!
//! Queries are normalized the same way the vocabularies were at training
//! time: every run of decimal digits collapses to a single `0` and the rest is
//! lower-cased. Completions are ranked shortest first; equal lengths keep
//! load order.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::space::VectorSpace;

/// Maximum number of completions returned.
pub const MAX_COMPLETIONS: usize = 10;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Normalize a raw query for matching against vocabulary tokens.
pub fn normalize_query(q: &str) -> String {
    DIGIT_RUN.replace_all(q, "0").to_lowercase()
}

/// Up to [`MAX_COMPLETIONS`] tokens starting with the normalized `q`.
///
/// An empty query (before or after normalization) yields no completions
/// rather than the whole vocabulary.
pub fn complete<'a>(space: &'a VectorSpace, q: &str) -> Vec<&'a str> {
    let prefix = normalize_query(q);
    if prefix.is_empty() || space.is_empty() {
        return Vec::new();
    }

    let mut rows = space.rows_with_prefix(&prefix).to_vec();
    // length in characters, load order is the tie-break
    rows.sort_unstable_by_key(|&row| (space.token(row).chars().count(), row));
    rows.truncate(MAX_COMPLETIONS);

    rows.into_iter().map(|row| space.token(row)).collect()
}
