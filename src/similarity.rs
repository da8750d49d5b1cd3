//! Cosine similarity and ranked neighbour search within one [`VectorSpace`].
//!
//! Similarity against a zero vector is defined as `0.0` instead of NaN so
//! every operation here stays total.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use rayon::prelude::*;

use crate::errors::{EngineError, EngineResult};
use crate::space::VectorSpace;

/// A ranked neighbour of a query token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub token: &'a str,
    pub score: f32,
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine from a dot product and both norms; zero when either norm is zero.
fn cosine_with_norms(dot: f32, a_norm: f32, b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    (dot / (a_norm * b_norm)).clamp(-1.0, 1.0)
}

/// Cosine similarity of two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    cosine_with_norms(dot(a, b), l2_norm(a), l2_norm(b))
}

fn row_similarity(space: &VectorSpace, a: usize, b: usize) -> f32 {
    cosine_with_norms(dot(space.row(a), space.row(b)), space.norm(a), space.norm(b))
}

/// Heap entry. `Greater` means ranked earlier: higher score, then lower row.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    row: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.row.cmp(&self.row))
    }
}

/// The `n` tokens most similar to `token`, best first.
///
/// The query token itself is excluded. Ties keep load order. When `n` is
/// larger than the rest of the vocabulary every other token is returned.
pub fn most_similar<'a>(
    space: &'a VectorSpace,
    token: &str,
    n: usize,
) -> EngineResult<Vec<Neighbor<'a>>> {
    if n == 0 {
        return Err(EngineError::InvalidParameter(
            "n must be a positive integer".to_string(),
        ));
    }
    let query = space.position(token)?;

    let scores: Vec<f32> = (0..space.len())
        .into_par_iter()
        .map(|row| row_similarity(space, query, row))
        .collect();

    // min-heap of the best `n` seen so far
    let mut heap: BinaryHeap<Reverse<Candidate>> =
        BinaryHeap::with_capacity(n.min(space.len()) + 1);
    for (row, &score) in scores.iter().enumerate() {
        if row == query {
            continue;
        }
        heap.push(Reverse(Candidate { score, row }));
        if heap.len() > n {
            heap.pop();
        }
    }

    Ok(heap
        .into_sorted_vec()
        .into_iter()
        .map(|Reverse(c)| Neighbor {
            token: space.token(c.row),
            score: c.score,
        })
        .collect())
}

/// Pairwise cosine similarity of two tokens.
pub fn similarity(space: &VectorSpace, a: &str, b: &str) -> EngineResult<f32> {
    let a = space.position(a)?;
    let b = space.position(b)?;
    Ok(row_similarity(space, a, b))
}

/// Similarity of each of `others` to `pivot`, in input order.
pub fn similarity_against_set<S: AsRef<str>>(
    space: &VectorSpace,
    pivot: &str,
    others: &[S],
) -> EngineResult<Vec<f32>> {
    let pivot = space.position(pivot)?;
    others
        .iter()
        .map(|other| {
            let row = space.position(other.as_ref())?;
            Ok(row_similarity(space, pivot, row))
        })
        .collect()
}
