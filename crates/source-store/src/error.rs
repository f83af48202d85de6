//! Error types for source-store

use thiserror::Error;

/// Errors raised by file stores and remote fetchers
#[derive(Error, Debug)]
pub enum StoreError {
    /// Path is not known to the store
    #[error("File not found: {0}")]
    NotFound(String),

    /// No file is currently active in the store
    #[error("No active file")]
    NoActiveFile,

    /// A remote fetch failed; the message is surfaced verbatim to callers
    #[error("{0}")]
    Fetch(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_displays_path() {
        let err = StoreError::NotFound("lib/Utils.sol".to_string());
        assert!(err.to_string().contains("lib/Utils.sol"));
    }

    #[test]
    fn test_fetch_error_is_verbatim() {
        let err = StoreError::Fetch("404 Not Found".to_string());
        assert_eq!(err.to_string(), "404 Not Found");
    }
}
