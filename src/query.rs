//! Query operations served to the outside world.
//!
//! The free functions are the operations themselves, each over an already
//! resolved [`VectorSpace`]. [`QueryFacade`] adds what the boundary needs on
//! top: space lookup by name, defaults for a missing `n`, and the
//! per-request limits.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{QueryDefaults, QueryLimits};
use crate::errors::{EngineError, EngineResult};
use crate::projector::{self, Point};
use crate::registry::{SpaceInfo, SpaceRegistry};
use crate::sampling;
use crate::similarity;
use crate::space::VectorSpace;
use crate::typeahead;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokensResponse {
    pub tokens: Vec<String>,
}

/// Tokens with their 2-D layout, `vectors[i]` belongs to `tokens[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResponse {
    pub tokens: Vec<String>,
    pub vectors: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResponse {
    pub tokens: Vec<String>,
    pub sims: Vec<f32>,
}

fn owned(tokens: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    tokens.into_iter().map(Into::into).collect()
}

fn require_positive(n: usize) -> EngineResult<()> {
    if n == 0 {
        return Err(EngineError::InvalidParameter(
            "n must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn project_tokens(space: &VectorSpace, tokens: Vec<String>) -> EngineResult<ProjectionResponse> {
    let vectors = tokens
        .iter()
        .map(|token| space.lookup(token))
        .collect::<EngineResult<Vec<&[f32]>>>()?;
    Ok(ProjectionResponse {
        vectors: projector::project(&vectors),
        tokens,
    })
}

/// Up to ten completions of `q`.
pub fn typeahead(space: &VectorSpace, q: &str) -> TokensResponse {
    TokensResponse {
        tokens: owned(typeahead::complete(space, q)),
    }
}

/// `pivot` followed by its `n` nearest neighbours, laid out in 2-D.
pub fn nearest(space: &VectorSpace, pivot: &str, n: usize) -> EngineResult<ProjectionResponse> {
    let neighbors = similarity::most_similar(space, pivot, n)?;
    let tokens = std::iter::once(pivot)
        .chain(neighbors.iter().map(|hit| hit.token))
        .map(str::to_string)
        .collect();
    project_tokens(space, tokens)
}

/// The given tokens laid out in 2-D together.
pub fn distances(space: &VectorSpace, tokens: &[String]) -> EngineResult<ProjectionResponse> {
    if tokens.is_empty() {
        return Err(EngineError::MissingParameter("q"));
    }
    project_tokens(space, tokens.to_vec())
}

/// The `n` nearest neighbours of `pivot` with their similarity scores.
pub fn similarity(space: &VectorSpace, pivot: &str, n: usize) -> EngineResult<SimilarityResponse> {
    let neighbors = similarity::most_similar(space, pivot, n)?;
    Ok(SimilarityResponse {
        tokens: neighbors.iter().map(|hit| hit.token.to_string()).collect(),
        sims: neighbors.iter().map(|hit| hit.score).collect(),
    })
}

/// Similarity of `tokens[1..]` to `tokens[0]`, in input order.
pub fn similarity_multiple(
    space: &VectorSpace,
    tokens: &[String],
) -> EngineResult<SimilarityResponse> {
    let (pivot, others) = tokens
        .split_first()
        .ok_or(EngineError::MissingParameter("q"))?;
    let sims = similarity::similarity_against_set(space, pivot, others)?;
    Ok(SimilarityResponse {
        tokens: others.to_vec(),
        sims,
    })
}

/// `pivot` followed by `n` random tokens, with the similarity of each random
/// token to `pivot`. The sample may contain `pivot` itself.
pub fn similarity_random<R: Rng + ?Sized>(
    space: &VectorSpace,
    pivot: &str,
    n: usize,
    rng: &mut R,
) -> EngineResult<SimilarityResponse> {
    require_positive(n)?;
    if !space.contains(pivot) {
        return Err(EngineError::UnknownToken(pivot.to_string()));
    }

    let sampled = sampling::sample(space, n, rng)?;
    let sims = similarity::similarity_against_set(space, pivot, &sampled)?;
    Ok(SimilarityResponse {
        tokens: owned(std::iter::once(pivot).chain(sampled)),
        sims,
    })
}

/// `n` distinct random tokens.
pub fn random_tokens<R: Rng + ?Sized>(
    space: &VectorSpace,
    n: usize,
    rng: &mut R,
) -> EngineResult<TokensResponse> {
    require_positive(n)?;
    Ok(TokensResponse {
        tokens: owned(sampling::sample(space, n, rng)?),
    })
}

/// Resolves spaces by name and applies request defaults and limits before
/// delegating to the operations above.
#[derive(Debug, Clone)]
pub struct QueryFacade {
    registry: Arc<SpaceRegistry>,
    defaults: QueryDefaults,
    limits: QueryLimits,
}

impl QueryFacade {
    pub fn new(registry: Arc<SpaceRegistry>, defaults: QueryDefaults, limits: QueryLimits) -> Self {
        Self {
            registry,
            defaults,
            limits,
        }
    }

    pub fn registry(&self) -> &SpaceRegistry {
        &self.registry
    }

    pub fn spaces(&self) -> Vec<SpaceInfo> {
        self.registry.summaries()
    }

    fn space(&self, name: &str) -> EngineResult<&VectorSpace> {
        self.registry.get(name)
    }

    fn neighbors(&self, n: Option<usize>) -> EngineResult<usize> {
        let n = n.unwrap_or(self.defaults.neighbors);
        within(n, self.limits.max_neighbors, "n")
    }

    fn sample_size(&self, n: Option<usize>, default: usize) -> EngineResult<usize> {
        within(n.unwrap_or(default), self.limits.max_sample, "n")
    }

    fn token_list<'a>(&self, tokens: &'a [String]) -> EngineResult<&'a [String]> {
        within(tokens.len(), self.limits.max_projection, "number of q values")?;
        Ok(tokens)
    }

    pub fn typeahead(&self, space: &str, q: &str) -> EngineResult<TokensResponse> {
        Ok(typeahead(self.space(space)?, q))
    }

    pub fn nearest(
        &self,
        space: &str,
        pivot: &str,
        n: Option<usize>,
    ) -> EngineResult<ProjectionResponse> {
        let space = self.space(space)?;
        nearest(space, pivot, self.neighbors(n)?)
    }

    pub fn distances(&self, space: &str, tokens: &[String]) -> EngineResult<ProjectionResponse> {
        let space = self.space(space)?;
        distances(space, self.token_list(tokens)?)
    }

    pub fn similarity(
        &self,
        space: &str,
        pivot: &str,
        n: Option<usize>,
    ) -> EngineResult<SimilarityResponse> {
        let space = self.space(space)?;
        similarity(space, pivot, self.neighbors(n)?)
    }

    pub fn similarity_multiple(
        &self,
        space: &str,
        tokens: &[String],
    ) -> EngineResult<SimilarityResponse> {
        let space = self.space(space)?;
        similarity_multiple(space, self.token_list(tokens)?)
    }

    pub fn similarity_random(
        &self,
        space: &str,
        pivot: &str,
        n: Option<usize>,
    ) -> EngineResult<SimilarityResponse> {
        self.similarity_random_with(space, pivot, n, &mut rand::rng())
    }

    pub fn similarity_random_with<R: Rng + ?Sized>(
        &self,
        space: &str,
        pivot: &str,
        n: Option<usize>,
        rng: &mut R,
    ) -> EngineResult<SimilarityResponse> {
        let space = self.space(space)?;
        let n = self.sample_size(n, self.defaults.neighbors)?;
        similarity_random(space, pivot, n, rng)
    }

    pub fn random_tokens(&self, space: &str, n: Option<usize>) -> EngineResult<TokensResponse> {
        self.random_tokens_with(space, n, &mut rand::rng())
    }

    pub fn random_tokens_with<R: Rng + ?Sized>(
        &self,
        space: &str,
        n: Option<usize>,
        rng: &mut R,
    ) -> EngineResult<TokensResponse> {
        let space = self.space(space)?;
        let n = self.sample_size(n, self.defaults.random_tokens)?;
        random_tokens(space, n, rng)
    }
}

fn within(value: usize, limit: usize, what: &str) -> EngineResult<usize> {
    if value > limit {
        return Err(EngineError::InvalidParameter(format!(
            "{what} must be at most {limit}, got {value}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn toy() -> VectorSpace {
        VectorSpace::new(
            "toy",
            2,
            vec!["cat".into(), "car".into(), "dog".into()],
            vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![-1.0, 0.0]],
        )
        .unwrap()
    }

    fn facade() -> QueryFacade {
        let registry: SpaceRegistry = std::iter::once(toy()).collect();
        QueryFacade::new(
            Arc::new(registry),
            QueryDefaults::default(),
            QueryLimits {
                max_neighbors: 5,
                max_projection: 3,
                max_sample: 3,
            },
        )
    }

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_nearest_prepends_pivot() {
        let space = toy();
        let resp = nearest(&space, "cat", 2).unwrap();
        assert_eq!(resp.tokens, vec!["cat", "car", "dog"]);
        assert_eq!(resp.vectors.len(), 3);
        for p in &resp.vectors {
            assert!(p.iter().all(|c| (-1.0..=1.0).contains(c)));
        }
    }

    #[test]
    fn test_distances_keeps_input_order() {
        let space = toy();
        let resp = distances(&space, &strings(&["dog", "cat"])).unwrap();
        assert_eq!(resp.tokens, vec!["dog", "cat"]);
        // two points spread along one axis
        let mut xs = [resp.vectors[0][0], resp.vectors[1][0]];
        xs.sort_by(f32::total_cmp);
        assert_eq!(xs, [-1.0, 1.0]);
        assert_eq!(resp.vectors[0][1], 0.0);
    }

    #[test]
    fn test_distances_single_token_is_origin() {
        let space = toy();
        let resp = distances(&space, &strings(&["dog"])).unwrap();
        assert_eq!(resp.vectors, vec![[0.0, 0.0]]);
    }

    #[test]
    fn test_distances_requires_tokens() {
        let space = toy();
        assert_eq!(
            distances(&space, &[]).unwrap_err(),
            EngineError::MissingParameter("q")
        );
    }

    #[test]
    fn test_distances_unknown_token() {
        let space = toy();
        assert_eq!(
            distances(&space, &strings(&["cat", "yak"])).unwrap_err(),
            EngineError::UnknownToken("yak".to_string())
        );
    }

    #[test]
    fn test_similarity() {
        let space = toy();
        let resp = similarity(&space, "cat", 1).unwrap();
        assert_eq!(resp.tokens, vec!["car"]);
        assert!((resp.sims[0] - 0.9939).abs() < 1e-3);
    }

    #[test]
    fn test_similarity_multiple_returns_remaining_tokens() {
        let space = toy();
        let resp = similarity_multiple(&space, &strings(&["cat", "dog", "car"])).unwrap();
        assert_eq!(resp.tokens, vec!["dog", "car"]);
        assert!((resp.sims[0] + 1.0).abs() < 1e-6);
        assert!(resp.sims[1] > 0.99);
    }

    #[test]
    fn test_similarity_multiple_pivot_only() {
        let space = toy();
        let resp = similarity_multiple(&space, &strings(&["cat"])).unwrap();
        assert!(resp.tokens.is_empty());
        assert!(resp.sims.is_empty());
    }

    #[test]
    fn test_similarity_random() {
        let space = toy();
        let mut rng = StdRng::seed_from_u64(1);
        let resp = similarity_random(&space, "dog", 3, &mut rng).unwrap();

        assert_eq!(resp.tokens[0], "dog");
        assert_eq!(resp.tokens.len(), 4);
        assert_eq!(resp.sims.len(), 3);
        for (token, sim) in resp.tokens[1..].iter().zip(&resp.sims) {
            let expected = similarity::similarity(&space, "dog", token).unwrap();
            assert_eq!(*sim, expected);
        }
    }

    #[test]
    fn test_similarity_random_unknown_pivot() {
        let space = toy();
        assert_eq!(
            similarity_random(&space, "eel", 1, &mut rand::rng()).unwrap_err(),
            EngineError::UnknownToken("eel".to_string())
        );
    }

    #[test]
    fn test_random_tokens() {
        let space = toy();
        let resp = random_tokens(&space, 2, &mut rand::rng()).unwrap();
        assert_eq!(resp.tokens.len(), 2);
        assert_ne!(resp.tokens[0], resp.tokens[1]);
        assert!(matches!(
            random_tokens(&space, 0, &mut rand::rng()),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_facade_unknown_space() {
        assert_eq!(
            facade().typeahead("nope", "ca").unwrap_err(),
            EngineError::UnknownSpace("nope".to_string())
        );
    }

    #[test]
    fn test_facade_defaults_and_limits() {
        let facade = facade();

        // default n (10) is over this facade's max_neighbors (5)
        assert!(matches!(
            facade.similarity("toy", "cat", None),
            Err(EngineError::InvalidParameter(_))
        ));
        assert_eq!(facade.similarity("toy", "cat", Some(5)).unwrap().tokens.len(), 2);

        assert!(matches!(
            facade.distances("toy", &strings(&["cat", "car", "dog", "cat"])),
            Err(EngineError::InvalidParameter(_))
        ));
        assert!(matches!(
            facade.random_tokens("toy", Some(4)),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_facade_seeded_sampling() {
        let facade = facade();
        let a = facade
            .random_tokens_with("toy", Some(2), &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = facade
            .random_tokens_with("toy", Some(2), &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }
}
