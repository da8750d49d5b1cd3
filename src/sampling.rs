//! Uniform token sampling without replacement.
//!
//! The random source is a type parameter so callers choose between the
//! thread-local generator and a seeded one.

use rand::Rng;

use crate::errors::{EngineError, EngineResult};
use crate::space::VectorSpace;

/// Draw `n` distinct tokens uniformly at random.
///
/// Fails with `InsufficientVocabulary` when `n` exceeds the vocabulary size.
pub fn sample<'a, R: Rng + ?Sized>(
    space: &'a VectorSpace,
    n: usize,
    rng: &mut R,
) -> EngineResult<Vec<&'a str>> {
    let available = space.len();
    if n > available {
        return Err(EngineError::InsufficientVocabulary {
            requested: n,
            available,
        });
    }

    let tokens = space.all_tokens();
    Ok(rand::seq::index::sample(rng, available, n)
        .into_iter()
        .map(|row| tokens[row].as_str())
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn space(size: usize) -> VectorSpace {
        VectorSpace::new(
            "s",
            1,
            (0..size).map(|i| format!("t{i}")).collect(),
            (0..size).map(|i| vec![i as f32]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_sample_distinct_members() {
        let space = space(50);
        let mut rng = StdRng::seed_from_u64(7);
        let picked = sample(&space, 20, &mut rng).unwrap();

        assert_eq!(picked.len(), 20);
        let unique: HashSet<&str> = picked.iter().copied().collect();
        assert_eq!(unique.len(), 20);
        assert!(picked.iter().all(|t| space.contains(t)));
    }

    #[test]
    fn test_sample_whole_vocabulary() {
        let space = space(5);
        let picked = sample(&space, 5, &mut rand::rng()).unwrap();
        let unique: HashSet<&str> = picked.into_iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_sample_zero() {
        let space = space(3);
        assert!(sample(&space, 0, &mut rand::rng()).unwrap().is_empty());
    }

    #[test]
    fn test_sample_insufficient_vocabulary() {
        let space = space(3);
        assert_eq!(
            sample(&space, 5, &mut rand::rng()).unwrap_err(),
            EngineError::InsufficientVocabulary {
                requested: 5,
                available: 3
            }
        );
    }

    #[test]
    fn test_sample_seeded_is_reproducible() {
        let space = space(100);
        let a = sample(&space, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = sample(&space, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }
}
