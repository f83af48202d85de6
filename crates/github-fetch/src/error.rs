//! Error types for github-fetch

use source_store::StoreError;
use thiserror::Error;

/// Errors that can occur while fetching repository content
#[derive(Error, Debug)]
pub enum FetchError {
    /// `owner/repo` was not of that shape
    #[error("Invalid repository reference: {0}")]
    InvalidRepo(String),

    /// The API answered with a non-success status
    #[error("GitHub returned {status} for {url}")]
    Status { status: u16, url: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(err.to_string())
    }
}

impl From<FetchError> for StoreError {
    fn from(err: FetchError) -> Self {
        StoreError::Fetch(err.to_string())
    }
}
