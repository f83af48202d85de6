//! In-memory fakes for the store traits (testing only)
//!
//! Provides `MemoryFileStore` and `MemoryFetcher` that satisfy the trait
//! contracts without touching disk or network. Both record how often they
//! were asked for each path so tests can assert "read at most once".

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryFileStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FileState {
    files: HashMap<String, String>,
    active: Option<String>,
    reads: HashMap<String, usize>,
}

/// In-memory file store backed by a `HashMap<path, content>`.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    state: Mutex<FileState>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(path, content)` pairs.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let store = Self::new();
        for (path, content) in files {
            store.insert(path, content);
        }
        store
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(path.into(), content.into());
    }

    /// Mark `path` as the active file.
    pub fn set_active(&self, path: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.active = Some(path.into());
    }

    /// Number of successful `get_file` calls for `path`.
    pub fn reads(&self, path: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.reads.get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn has_file(&self, path: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path)
    }

    async fn get_file(&self, path: &str) -> StoreResult<String> {
        let mut state = self.state.lock().unwrap();
        let content = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        *state.reads.entry(path.to_string()).or_insert(0) += 1;
        Ok(content)
    }

    async fn active_file_path(&self) -> StoreResult<String> {
        let state = self.state.lock().unwrap();
        state.active.clone().ok_or(StoreError::NoActiveFile)
    }
}

// ---------------------------------------------------------------------------
// MemoryFetcher
// ---------------------------------------------------------------------------

/// Canned remote fetcher keyed by `"<owner>/<repo>/<rest>"`.
///
/// Unknown keys fail with `404 Not Found`.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: Mutex<HashMap<String, Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for `owner_repo/rest_path`.
    pub fn respond(&self, owner_repo: &str, rest_path: &str, content: impl Into<String>) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(format!("{owner_repo}/{rest_path}"), Ok(content.into()));
    }

    /// Fail `owner_repo/rest_path` with `reason`.
    pub fn fail(&self, owner_repo: &str, rest_path: &str, reason: impl Into<String>) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(format!("{owner_repo}/{rest_path}"), Err(reason.into()));
    }

    /// Every key requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteFetcher for MemoryFetcher {
    async fn fetch(&self, owner_repo: &str, rest_path: &str) -> StoreResult<String> {
        let key = format!("{owner_repo}/{rest_path}");
        self.calls.lock().unwrap().push(key.clone());
        let responses = self.responses.lock().unwrap();
        match responses.get(&key) {
            Some(Ok(content)) => Ok(content.clone()),
            Some(Err(reason)) => Err(StoreError::Fetch(reason.clone())),
            None => Err(StoreError::Fetch("404 Not Found".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_counts_reads() {
        let store = MemoryFileStore::with_files([("A.sol", "contract A {}")]);
        assert!(store.has_file("A.sol").await);
        assert!(!store.has_file("B.sol").await);
        assert_eq!(store.get_file("A.sol").await.unwrap(), "contract A {}");
        assert_eq!(store.reads("A.sol"), 1);
        assert_eq!(store.reads("B.sol"), 0);
    }

    #[tokio::test]
    async fn test_active_file_content_follows_active_path() {
        let store = MemoryFileStore::with_files([("A.sol", "a"), ("B.sol", "b")]);
        assert!(matches!(
            store.active_file_path().await,
            Err(StoreError::NoActiveFile)
        ));
        store.set_active("B.sol");
        assert_eq!(store.active_file_content().await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_memory_fetcher_records_calls() {
        let fetcher = MemoryFetcher::new();
        fetcher.respond("acme/lib", "Utils.sol", "library Utils {}");
        fetcher.fail("acme/lib", "Broken.sol", "rate limited");

        assert_eq!(
            fetcher.fetch("acme/lib", "Utils.sol").await.unwrap(),
            "library Utils {}"
        );
        let err = fetcher.fetch("acme/lib", "Broken.sol").await.unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
        let err = fetcher.fetch("acme/lib", "Missing.sol").await.unwrap_err();
        assert!(err.to_string().contains("404"));

        assert_eq!(
            fetcher.calls(),
            vec![
                "acme/lib/Utils.sol".to_string(),
                "acme/lib/Broken.sol".to_string(),
                "acme/lib/Missing.sol".to_string(),
            ]
        );
    }
}
