//! Immutable in-memory embedding table.
//!
//! A [`VectorSpace`] owns one named vocabulary and its vectors, stored
//! row-major in a single contiguous buffer. Alongside the rows it keeps:
//!
//! - a token → row map for O(1) lookup
//! - the L2 norm of every row, so similarity scans never recompute them
//! - the row ids sorted by token bytes, so prefix queries are a binary search
//!   instead of a full scan
//!
//! Spaces are built once at startup and only ever shared by `&` afterwards.

use std::collections::HashMap;

use crate::errors::{EngineError, EngineResult};

pub struct VectorSpace {
    name: String,
    dimension: usize,
    tokens: Vec<String>,
    /// `tokens.len() * dimension` values, row `i` belongs to `tokens[i]`
    data: Vec<f32>,
    norms: Vec<f32>,
    index: HashMap<String, usize>,
    /// Row ids ordered by token bytes
    sorted: Vec<usize>,
}

impl std::fmt::Debug for VectorSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSpace")
            .field("name", &self.name)
            .field("dimension", &self.dimension)
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl VectorSpace {
    /// Build a space from parallel token and vector lists.
    ///
    /// Fails with `SizeMismatch` when the lists differ in length and with
    /// `DimensionMismatch` when any vector is not `dimension` long.
    pub fn new(
        name: impl Into<String>,
        dimension: usize,
        tokens: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> EngineResult<Self> {
        if tokens.len() != vectors.len() {
            return Err(EngineError::SizeMismatch {
                tokens: tokens.len(),
                vectors: vectors.len(),
            });
        }

        let mut data = Vec::with_capacity(vectors.iter().map(Vec::len).sum());
        for (token, vector) in tokens.iter().zip(vectors.iter()) {
            if vector.len() != dimension {
                return Err(EngineError::DimensionMismatch {
                    token: token.clone(),
                    expected: dimension,
                    got: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }

        Self::from_flat(name, dimension, tokens, data)
    }

    /// Build a space from a row-major buffer of `tokens.len() * dimension`
    /// values. This is what the file readers produce.
    pub fn from_flat(
        name: impl Into<String>,
        dimension: usize,
        tokens: Vec<String>,
        data: Vec<f32>,
    ) -> EngineResult<Self> {
        if dimension == 0 {
            return Err(EngineError::InvalidParameter(
                "dimension must be positive".to_string(),
            ));
        }
        if tokens.is_empty() {
            return Err(EngineError::EmptySpace);
        }
        let expected = tokens.len().checked_mul(dimension);
        if expected != Some(data.len()) {
            return Err(EngineError::SizeMismatch {
                tokens: tokens.len(),
                vectors: data.len() / dimension,
            });
        }

        let mut index = HashMap::with_capacity(tokens.len());
        for (row, token) in tokens.iter().enumerate() {
            if index.insert(token.clone(), row).is_some() {
                return Err(EngineError::DuplicateToken(token.clone()));
            }
        }

        let norms = data
            .chunks_exact(dimension)
            .map(crate::similarity::l2_norm)
            .collect();

        let mut sorted: Vec<usize> = (0..tokens.len()).collect();
        sorted.sort_unstable_by(|&a, &b| tokens[a].cmp(&tokens[b]));

        Ok(Self {
            name: name.into(),
            dimension,
            tokens,
            data,
            norms,
            index,
            sorted,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Vocabulary size.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Every token in load order.
    pub fn all_tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Row id of `token`.
    pub fn position(&self, token: &str) -> EngineResult<usize> {
        self.index
            .get(token)
            .copied()
            .ok_or_else(|| EngineError::UnknownToken(token.to_string()))
    }

    /// Read-only view of the vector for `token`.
    pub fn lookup(&self, token: &str) -> EngineResult<&[f32]> {
        self.position(token).map(|row| self.row(row))
    }

    /// Alias of [`lookup`](Self::lookup); the returned slice is borrowed,
    /// so callers cannot mutate the stored vector.
    pub fn vector_of(&self, token: &str) -> EngineResult<&[f32]> {
        self.lookup(token)
    }

    pub(crate) fn row(&self, row: usize) -> &[f32] {
        let start = row * self.dimension;
        &self.data[start..start + self.dimension]
    }

    pub(crate) fn norm(&self, row: usize) -> f32 {
        self.norms[row]
    }

    pub(crate) fn token(&self, row: usize) -> &str {
        &self.tokens[row]
    }

    /// Row ids of every token starting with `prefix`, in byte order of the
    /// tokens. An empty prefix matches the whole vocabulary.
    pub fn rows_with_prefix(&self, prefix: &str) -> &[usize] {
        let start = self
            .sorted
            .partition_point(|&row| self.tokens[row].as_str() < prefix);
        let rest = &self.sorted[start..];
        let len = rest.partition_point(|&row| self.tokens[row].starts_with(prefix));
        &rest[..len]
    }
}
