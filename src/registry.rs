//! Named collection of loaded [`VectorSpace`]s.
//!
//! Populated once at startup from a data directory and read-only after
//! that, so it is shared behind a plain `Arc` with no locking.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::errors::{EngineError, EngineResult};
use crate::formats::{self, LoadedSpace};
use crate::space::VectorSpace;

/// Listing entry for one loaded space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpaceInfo {
    pub name: String,
    pub tokens: usize,
    pub dimension: usize,
}

#[derive(Debug, Default)]
pub struct SpaceRegistry {
    spaces: BTreeMap<String, VectorSpace>,
}

impl SpaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every file in `dir` whose extension is in `extensions`, one
    /// space per file, named after the file stem.
    ///
    /// A file that fails to load is logged and skipped. Only failing to list
    /// the directory itself is an error.
    pub fn load_all(dir: &Path, extensions: &[String]) -> std::io::Result<Self> {
        let files = embedding_files(dir, extensions)?;
        log::info!(
            "loading {} embedding file(s) from {}",
            files.len(),
            dir.display()
        );

        // parse in parallel, register in file name order
        let loaded: Vec<(PathBuf, Result<LoadedSpace, formats::FormatError>)> = files
            .into_par_iter()
            .map(|path| {
                let result = formats::read_space(&path);
                (path, result)
            })
            .collect();

        let mut registry = Self::new();
        for (path, result) in loaded {
            match result {
                Ok(LoadedSpace { space, rejections }) => {
                    if !rejections.is_empty() {
                        let first = rejections
                            .first
                            .as_ref()
                            .map(|(entry, reason)| format!(" (first at entry {entry}: {reason})"))
                            .unwrap_or_default();
                        log::warn!(
                            "{}: skipped {} malformed entries{first}",
                            path.display(),
                            rejections.count
                        );
                    }
                    log::info!(
                        "loaded space {:?}: {} tokens, dimension {}",
                        space.name(),
                        space.len(),
                        space.dimension()
                    );
                    let name = space.name().to_string();
                    if !registry.insert(space) {
                        log::warn!(
                            "{}: a space named {name:?} is already loaded, skipping",
                            path.display()
                        );
                    }
                }
                Err(err) => {
                    log::warn!("{}: failed to load, skipping: {err}", path.display());
                }
            }
        }

        if registry.is_empty() {
            log::warn!("no embedding spaces loaded from {}", dir.display());
        }

        Ok(registry)
    }

    /// Register `space`. Returns `false` and keeps the existing entry when
    /// the name is taken.
    pub fn insert(&mut self, space: VectorSpace) -> bool {
        if self.spaces.contains_key(space.name()) {
            return false;
        }
        self.spaces.insert(space.name().to_string(), space);
        true
    }

    pub fn get(&self, name: &str) -> EngineResult<&VectorSpace> {
        self.spaces
            .get(name)
            .ok_or_else(|| EngineError::UnknownSpace(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Loaded space names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.spaces.keys().map(|name| name.as_str())
    }

    pub fn summaries(&self) -> Vec<SpaceInfo> {
        self.spaces
            .values()
            .map(|space| SpaceInfo {
                name: space.name().to_string(),
                tokens: space.len(),
                dimension: space.dimension(),
            })
            .collect()
    }
}

impl FromIterator<VectorSpace> for SpaceRegistry {
    fn from_iter<I: IntoIterator<Item = VectorSpace>>(iter: I) -> Self {
        let mut registry = Self::new();
        for space in iter {
            registry.insert(space);
        }
        registry
    }
}

/// Regular files in `dir` with a recognized extension, sorted by name.
fn embedding_files(dir: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            formats::extension_of(path)
                .map(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(&ext)))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
