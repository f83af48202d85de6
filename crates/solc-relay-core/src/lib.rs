//! solc-relay Core Library
//!
//! Gathers the imports of a Solidity source, drives an in-process or
//! worker-hosted compiler, and retries when the compiler reports inputs it
//! could not find.

pub mod backend;
pub mod bundle;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod resolver;
pub mod telemetry;

pub use backend::protocol::{WorkerCommand, WorkerMessage};
pub use backend::{
    BackendCompletion, CompilerBackend, InProcessBackend, LocalWorker, NotLoadedBackend,
    ProcessWorker, WorkerBackend, WorkerChannels, WorkerSpawner,
};
pub use bundle::{CompilerInput, FileBundle};
pub use compiler::{Compiler, CompilerLoader, ImportReply};
pub use config::OrchestratorConfig;
pub use error::{BackendError, BackendResult, ImportError};
pub use events::{CompilerEvent, EventBus};
pub use orchestrator::{
    CompilationOrchestrator, CompilationReport, CompileOutcome, LastCompilation,
};
pub use resolver::{scan_imports, ImportResolver, RemoteCache, RemoteRef, ResolvedInput};

pub use source_store::{FileStore, RemoteFetcher, StoreError};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
