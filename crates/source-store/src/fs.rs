use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::storage_traits::{FileStore, StoreResult};

/// Directory-backed file store.
///
/// Logical paths are resolved relative to `root`. Paths that are absolute or
/// climb out of the root (`..`) are treated as absent.
pub struct DirFileStore {
    root: PathBuf,
    active: Mutex<Option<String>>,
}

impl DirFileStore {
    /// Create a store rooted at `root`. The directory must exist.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StoreError::NotFound(root.display().to_string()));
        }
        Ok(Self {
            root,
            active: Mutex::new(None),
        })
    }

    /// Mark `path` as the active file.
    pub fn set_active(&self, path: impl Into<String>) {
        *self.active.lock().unwrap() = Some(path.into());
    }

    fn local_path(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        contained.then(|| self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for DirFileStore {
    async fn has_file(&self, path: &str) -> bool {
        match self.local_path(path) {
            Some(p) => tokio::fs::metadata(&p)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            None => false,
        }
    }

    async fn get_file(&self, path: &str) -> StoreResult<String> {
        let local = self
            .local_path(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        debug!(path = %path, "reading source from disk");
        tokio::fs::read_to_string(&local).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_string())
            } else {
                StoreError::Io(e)
            }
        })
    }

    async fn active_file_path(&self) -> StoreResult<String> {
        self.active.lock().unwrap().clone().ok_or(StoreError::NoActiveFile)
    }
}
