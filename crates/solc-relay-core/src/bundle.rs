//! Source bundles: the unit handed to a compiler backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Mapping from logical file path to source text.
///
/// Paths are only ever added: once present, a path keeps its first content
/// for the lifetime of the bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileBundle(BTreeMap<String, String>);

impl FileBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle holding exactly one file.
    pub fn single(path: impl Into<String>, content: impl Into<String>) -> Self {
        let mut bundle = Self::new();
        bundle.add(path, content);
        bundle
    }

    /// Add `path` unless it is already present. Returns whether it was added.
    pub fn add(&mut self, path: impl Into<String>, content: impl Into<String>) -> bool {
        let path = path.into();
        if self.0.contains_key(&path) {
            return false;
        }
        self.0.insert(path, content.into());
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `(path, content)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// SHA-256 over every `(path, content)` pair, hex encoded.
    ///
    /// Two bundles with the same files always share a digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, content) in &self.0 {
            hasher.update((path.len() as u64).to_le_bytes());
            hasher.update(path.as_bytes());
            hasher.update((content.len() as u64).to_le_bytes());
            hasher.update(content.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for FileBundle {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut bundle = Self::new();
        for (path, content) in iter {
            bundle.add(path, content);
        }
        bundle
    }
}

/// What a backend actually receives.
///
/// Serialises to `{"sources": {...}}` for multi-file backends and to a bare
/// source string for legacy single-source backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompilerInput {
    Multi { sources: FileBundle },
    Single(String),
}

impl CompilerInput {
    pub fn multi(sources: FileBundle) -> Self {
        CompilerInput::Multi { sources }
    }
}
