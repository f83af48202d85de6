use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{instrument, warn};

use super::{BackendCompletion, CompilerBackend};
use crate::bundle::{CompilerInput, FileBundle};
use crate::compiler::{Compiler, ImportReply};
use crate::error::BackendResult;

/// A compiler run that did not produce a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunFault {
    /// `Compiler::compile` returned an error.
    Failed(String),
    /// `Compiler::compile` panicked.
    Panicked(String),
}

impl RunFault {
    pub(crate) fn message(&self) -> &str {
        match self {
            RunFault::Failed(m) | RunFault::Panicked(m) => m,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "compiler panicked".to_string())
}

/// Run `compiler` on a blocking task, recording every path it reports
/// missing and answering each with a deferred-import reply.
pub(crate) async fn run_compiler(
    compiler: Arc<dyn Compiler>,
    input: CompilerInput,
    optimize: bool,
) -> (Result<Value, RunFault>, Vec<String>) {
    let joined = tokio::task::spawn_blocking(move || {
        let mut missing = Vec::new();
        let result = compiler.compile(&input, optimize, &mut |path: &str| {
            missing.push(path.to_string());
            ImportReply::deferred()
        });
        (result, missing)
    })
    .await;

    match joined {
        Ok((Ok(data), missing)) => (Ok(data), missing),
        Ok((Err(e), missing)) => (Err(RunFault::Failed(e.to_string())), missing),
        Err(e) if e.is_panic() => (Err(RunFault::Panicked(panic_message(e.into_panic()))), Vec::new()),
        Err(e) => (Err(RunFault::Failed(e.to_string())), Vec::new()),
    }
}

/// Strategy that calls the compiler in this process.
pub struct InProcessBackend {
    compiler: Arc<dyn Compiler>,
}

impl InProcessBackend {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self { compiler }
    }
}

#[async_trait]
impl CompilerBackend for InProcessBackend {
    fn version(&self) -> Option<String> {
        Some(self.compiler.version())
    }

    fn accepts_multiple_files(&self) -> bool {
        self.compiler.accepts_multiple_files()
    }

    #[instrument(skip_all, fields(files = sources.len()))]
    async fn compile(
        &self,
        input: CompilerInput,
        sources: FileBundle,
        optimize: bool,
    ) -> BackendResult<BackendCompletion> {
        let (result, missing_inputs) =
            run_compiler(Arc::clone(&self.compiler), input, optimize).await;

        match result {
            Ok(data) => Ok(BackendCompletion {
                data,
                missing_inputs,
                sources,
            }),
            Err(fault) => {
                warn!(fault = ?fault, "in-process compiler faulted");
                Ok(BackendCompletion::failed(
                    format!("Uncaught compiler exception:\n{}", fault.message()),
                    sources,
                ))
            }
        }
    }
}
