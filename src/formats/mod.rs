//! Readers for on-disk embedding files.
//!
//! Supported layouts, picked by file extension:
//!
//! - `txt` / `vec`: one `token v1 .. vd` entry per line, with an optional
//!   word2vec `count dim` header line (GloVe files have none)
//! - `bin`: word2vec binary, a `count dim` text header followed by
//!   `token<space>` and `dim` little-endian `f32`s per entry
//!
//! Bad entries are dropped one at a time and tallied in [`Rejections`];
//! only an unreadable header, a truncated binary file or a file with no
//! usable entries fails as a whole.

mod text;
mod word2vec_bin;

use std::collections::HashSet;
use std::path::Path;

use crate::errors::EngineError;
use crate::space::VectorSpace;

pub use text::read_text;
pub use word2vec_bin::read_word2vec_bin;

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file extension: {0:?}")]
    UnsupportedExtension(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("file truncated after {0} entries")]
    Truncated(usize),

    #[error("malformed file: {0}")]
    Malformed(String),

    #[error("no valid entries")]
    NoEntries,

    #[error("space error: {0}")]
    Space(#[from] EngineError),
}

/// Largest vector dimension a file header may declare.
pub const MAX_DIMENSION: usize = 65_536;

/// Entries preallocated from a header count.
const MAX_PREALLOC_ENTRIES: usize = 1 << 20;

/// Values (`f32`s) preallocated from a header count and dimension.
const MAX_PREALLOC_VALUES: usize = 1 << 24;

/// Parse the `count dim` pair of a word2vec header.
fn parse_header_fields(count: &str, dimension: &str) -> Result<(usize, usize), FormatError> {
    let count = count
        .parse::<usize>()
        .map_err(|e| FormatError::InvalidHeader(format!("count: {e}")))?;
    let dimension = dimension
        .parse::<usize>()
        .map_err(|e| FormatError::InvalidHeader(format!("dimension: {e}")))?;
    if dimension == 0 || dimension > MAX_DIMENSION {
        return Err(FormatError::InvalidHeader(format!(
            "dimension must be between 1 and {MAX_DIMENSION}, got {dimension}"
        )));
    }
    Ok((count, dimension))
}

/// Entries dropped while reading one file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Rejections {
    pub count: usize,
    /// Entry number (1-based) and reason of the first rejection
    pub first: Option<(usize, String)>,
}

impl Rejections {
    fn record(&mut self, entry: usize, reason: impl Into<String>) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some((entry, reason.into()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// A space read from disk together with what was dropped on the way.
#[derive(Debug)]
pub struct LoadedSpace {
    pub space: VectorSpace,
    pub rejections: Rejections,
}

/// Read `path` with the reader matching its extension. The space is named
/// after the file stem.
pub fn read_space(path: &Path) -> Result<LoadedSpace, FormatError> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| FormatError::Malformed(format!("no usable file name: {path:?}")))?
        .to_string();

    match extension_of(path).as_deref() {
        Some("txt") | Some("vec") => read_text(name, path),
        Some("bin") => read_word2vec_bin(name, path),
        other => Err(FormatError::UnsupportedExtension(
            other.unwrap_or_default().to_string(),
        )),
    }
}

/// Lower-cased extension of `path`, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Accumulates accepted entries in load order, dropping duplicates and
/// non-finite vectors.
struct SpaceBuilder {
    dimension: Option<usize>,
    tokens: Vec<String>,
    data: Vec<f32>,
    seen: HashSet<String>,
    rejections: Rejections,
}

impl SpaceBuilder {
    /// `capacity` and `dimension` may come straight from a file header, so
    /// only a bounded amount is reserved up front.
    fn new(dimension: Option<usize>, capacity: usize) -> Self {
        let capacity = capacity.min(MAX_PREALLOC_ENTRIES);
        let values = capacity
            .checked_mul(dimension.unwrap_or(0))
            .unwrap_or(MAX_PREALLOC_VALUES)
            .min(MAX_PREALLOC_VALUES);
        Self {
            dimension,
            tokens: Vec::with_capacity(capacity),
            data: Vec::with_capacity(values),
            seen: HashSet::with_capacity(capacity),
            rejections: Rejections::default(),
        }
    }

    fn reject(&mut self, entry: usize, reason: impl Into<String>) {
        self.rejections.record(entry, reason);
    }

    fn push(&mut self, entry: usize, token: String, values: Vec<f32>) {
        if token.is_empty() {
            return self.reject(entry, "empty token");
        }

        if values.is_empty() {
            return self.reject(entry, format!("no values for {token:?}"));
        }

        let dimension = *self.dimension.get_or_insert(values.len());
        if values.len() != dimension {
            return self.reject(
                entry,
                format!("expected {dimension} values, got {}", values.len()),
            );
        }
        if values.iter().any(|v| !v.is_finite()) {
            return self.reject(entry, format!("non-finite value for {token:?}"));
        }
        if !self.seen.insert(token.clone()) {
            return self.reject(entry, format!("duplicate token {token:?}"));
        }

        self.tokens.push(token);
        self.data.extend_from_slice(&values);
    }

    fn finish(self, name: String) -> Result<LoadedSpace, FormatError> {
        let dimension = match self.dimension {
            Some(dimension) if !self.tokens.is_empty() => dimension,
            _ => return Err(FormatError::NoEntries),
        };
        let space = VectorSpace::from_flat(name, dimension, self.tokens, self.data)?;
        Ok(LoadedSpace {
            space,
            rejections: self.rejections,
        })
    }
}
