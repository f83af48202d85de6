//! Collaborator contracts used by the import resolver
//!
//! These traits define the two places source text can come from:
//! - `FileStore`: user-editable files (editor buffers or a directory)
//! - `RemoteFetcher`: repository-hosted files reached over the network
//!
//! Both are async and backend-agnostic. In-memory fakes live in the `fakes`
//! module.

use async_trait::async_trait;

use crate::error::StoreError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// FileStore: local, user-editable sources
// ---------------------------------------------------------------------------

/// Store of local source files keyed by logical path.
///
/// Guarantees:
/// - `has_file(p)` returning `true` means `get_file(p)` succeeds.
/// - The active file is always one of the store's paths when set.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Whether the store holds `path`.
    async fn has_file(&self, path: &str) -> bool;

    /// Contents of `path`. Returns `StoreError::NotFound` if absent.
    async fn get_file(&self, path: &str) -> StoreResult<String>;

    /// Logical path of the file currently being edited.
    async fn active_file_path(&self) -> StoreResult<String>;

    /// Contents of the file currently being edited.
    async fn active_file_content(&self) -> StoreResult<String> {
        let path = self.active_file_path().await?;
        self.get_file(&path).await
    }
}

// ---------------------------------------------------------------------------
// RemoteFetcher: repository-hosted sources
// ---------------------------------------------------------------------------

/// Fetches the raw content of a file inside a hosted repository.
///
/// One network attempt per call; callers own caching and never expect the
/// fetcher to retry.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Fetch `rest_path` from `owner_repo` (`"<owner>/<repo>"`).
    ///
    /// Failures carry a human-readable message in `StoreError::Fetch`.
    async fn fetch(&self, owner_repo: &str, rest_path: &str) -> StoreResult<String>;
}
