//! GitHub-Fetch: remote import source for solc-relay
//!
//! Implements `source_store::RemoteFetcher` over the GitHub contents API so
//! imports such as `github.com/<owner>/<repo>/<path>` can be pulled into a
//! compilation bundle.

mod client;
mod config;
mod error;

pub use client::GithubFetcher;
pub use config::{GithubConfig, DEFAULT_API_URL};
pub use error::FetchError;

/// Result type for github-fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;
