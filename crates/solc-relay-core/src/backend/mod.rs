//! Compiler backends behind one completion contract.
//!
//! Two strategies implement [`CompilerBackend`]:
//! - [`InProcessBackend`]: calls a [`Compiler`](crate::compiler::Compiler)
//!   directly on a blocking task
//! - [`WorkerBackend`]: posts jobs to a worker over message channels and
//!   matches answers by job id
//!
//! Both hand back a [`BackendCompletion`]. Backend faults never surface as
//! errors: they become `{"error": ...}` payloads so the orchestrator
//! classifies them like any compiler diagnostic. The one exception is
//! [`BackendError::JobAbandoned`](crate::error::BackendError::JobAbandoned),
//! returned when a worker is torn down with the job still pending.

mod in_process;
mod local_worker;
mod process_worker;
pub mod protocol;
mod worker;

use async_trait::async_trait;
use serde_json::Value;

use crate::bundle::{CompilerInput, FileBundle};
use crate::diagnostics::error_payload;
use crate::error::{BackendError, BackendResult};

pub use in_process::InProcessBackend;
pub use local_worker::LocalWorker;
pub use process_worker::ProcessWorker;
pub use worker::{WorkerBackend, WorkerChannels, WorkerSpawner};

/// Uniform result of one backend round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCompletion {
    /// Raw result payload from the compiler, or a synthetic error payload.
    pub data: Value,
    /// Paths the compiler asked for but could not find.
    pub missing_inputs: Vec<String>,
    /// The bundle the compiler was given.
    pub sources: FileBundle,
}

impl BackendCompletion {
    /// Completion carrying only `{"error": message}`.
    pub fn failed(message: impl Into<String>, sources: FileBundle) -> Self {
        Self {
            data: error_payload(message),
            missing_inputs: Vec::new(),
            sources,
        }
    }
}

/// One live compiler strategy.
#[async_trait]
pub trait CompilerBackend: Send + Sync {
    /// Compiler version, once known.
    fn version(&self) -> Option<String>;

    /// Whether the compiler takes a multi-file bundle.
    fn accepts_multiple_files(&self) -> bool;

    /// Compile `input`, which was resolved from `sources`.
    async fn compile(
        &self,
        input: CompilerInput,
        sources: FileBundle,
        optimize: bool,
    ) -> BackendResult<BackendCompletion>;

    /// Release transport resources. Pending jobs are abandoned.
    fn shutdown(&self) {}
}

/// Placeholder installed while a compiler loads. Every compile fails at once.
#[derive(Debug, Default)]
pub struct NotLoadedBackend;

#[async_trait]
impl CompilerBackend for NotLoadedBackend {
    fn version(&self) -> Option<String> {
        None
    }

    fn accepts_multiple_files(&self) -> bool {
        false
    }

    async fn compile(
        &self,
        _input: CompilerInput,
        sources: FileBundle,
        _optimize: bool,
    ) -> BackendResult<BackendCompletion> {
        Ok(BackendCompletion::failed(
            BackendError::NotLoaded.to_string(),
            sources,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn not_loaded_fails_fast() {
        let backend = NotLoadedBackend;
        let sources = FileBundle::single("A.sol", "contract A {}");
        let done = backend
            .compile(CompilerInput::Single(String::new()), sources.clone(), false)
            .await
            .unwrap();
        assert_eq!(done.data["error"], "Compiler not yet loaded.");
        assert!(done.missing_inputs.is_empty());
        assert_eq!(done.sources, sources);
        assert!(backend.version().is_none());
    }
}
