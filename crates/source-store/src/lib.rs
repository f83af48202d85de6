//! Source-Store: where solc-relay finds source text
//!
//! This crate holds the collaborator contracts consumed by the import
//! resolver, plus the stores that ship with it.
//!
//! ## Key Components
//!
//! - `FileStore`: local, user-editable files with an active file
//! - `RemoteFetcher`: repository-hosted files, one attempt per call
//! - `DirFileStore`: a `FileStore` over a directory on disk
//! - `fakes`: in-memory `MemoryFileStore` / `MemoryFetcher` for tests

mod error;
pub mod fakes;
mod fs;
pub mod storage_traits;

pub use error::StoreError;
pub use fs::DirFileStore;
pub use storage_traits::{FileStore, RemoteFetcher, StoreResult};
