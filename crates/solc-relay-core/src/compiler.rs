//! Compiler entry points.
//!
//! The compilation algorithm itself lives outside this crate. A [`Compiler`]
//! is the opaque function from input bundle to result JSON, and a
//! [`CompilerLoader`] turns a release URL into one.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::bundle::CompilerInput;
use crate::diagnostics::DEFERRED_IMPORT;
use crate::error::BackendResult;

/// Answer to a compiler's request for a file it could not find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportReply {
    Contents(String),
    Error(String),
}

impl ImportReply {
    /// Tell the compiler to carry on without the file; it will be gathered
    /// and the compilation retried.
    pub fn deferred() -> Self {
        ImportReply::Error(DEFERRED_IMPORT.to_string())
    }
}

/// In-process compiler.
///
/// `compile` runs to completion on the calling thread. For every import it
/// cannot satisfy from `input` it calls `missing_import` once with the path.
pub trait Compiler: Send + Sync {
    fn version(&self) -> String;

    /// Whether `compile` accepts [`CompilerInput::Multi`].
    fn accepts_multiple_files(&self) -> bool;

    fn compile(
        &self,
        input: &CompilerInput,
        optimize: bool,
        missing_import: &mut dyn FnMut(&str) -> ImportReply,
    ) -> BackendResult<Value>;
}

/// Produces a compiler from a release URL.
#[async_trait]
pub trait CompilerLoader: Send + Sync {
    async fn load(&self, url: &str) -> BackendResult<Arc<dyn Compiler>>;
}
