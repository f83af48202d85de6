//! Worker hosted on a tokio task.
//!
//! Speaks the same protocol as an out-of-process worker, which makes it the
//! reference implementation of the worker side and keeps the message-passing
//! path testable without spawning processes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::in_process::{run_compiler, RunFault};
use super::protocol::{WorkerCommand, WorkerMessage};
use super::worker::{WorkerChannels, WorkerSpawner};
use crate::bundle::CompilerInput;
use crate::compiler::{Compiler, CompilerLoader};
use crate::diagnostics::error_payload;
use crate::error::{BackendError, BackendResult};

/// Spawns task-hosted workers around a [`CompilerLoader`].
pub struct LocalWorker {
    loader: Arc<dyn CompilerLoader>,
}

impl LocalWorker {
    pub fn new(loader: Arc<dyn CompilerLoader>) -> Self {
        Self { loader }
    }
}

impl WorkerSpawner for LocalWorker {
    fn spawn(&self) -> BackendResult<WorkerChannels> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(Arc::clone(&self.loader), cmd_rx, msg_tx));
        Ok(WorkerChannels {
            commands: cmd_tx,
            messages: msg_rx,
        })
    }
}

async fn serve(
    loader: Arc<dyn CompilerLoader>,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    messages: mpsc::UnboundedSender<WorkerMessage>,
) {
    let mut compiler: Option<Arc<dyn Compiler>> = None;

    while let Some(command) = commands.recv().await {
        let reply = match command {
            WorkerCommand::LoadVersion { data: url } => match loader.load(&url).await {
                Ok(loaded) => {
                    let reply = WorkerMessage::VersionLoaded {
                        data: loaded.version(),
                        accepts_multiple_files: loaded.accepts_multiple_files(),
                    };
                    compiler = Some(loaded);
                    reply
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "worker failed to load compiler");
                    WorkerMessage::Error {
                        data: e.to_string(),
                    }
                }
            },
            WorkerCommand::Compile {
                job,
                source,
                optimize,
            } => compile_job(compiler.clone(), job, &source, optimize != 0).await,
        };

        if messages.send(reply).is_err() {
            break;
        }
    }
    debug!("local worker stopped");
}

fn compiled(job: u64, message: String) -> WorkerMessage {
    WorkerMessage::Compiled {
        job,
        data: error_payload(message).to_string(),
        missing_inputs: Vec::new(),
    }
}

async fn compile_job(
    compiler: Option<Arc<dyn Compiler>>,
    job: u64,
    source: &str,
    optimize: bool,
) -> WorkerMessage {
    let Some(compiler) = compiler else {
        return compiled(job, BackendError::NotLoaded.to_string());
    };
    let input: CompilerInput = match serde_json::from_str(source) {
        Ok(input) => input,
        Err(e) => return compiled(job, format!("Invalid compiler input: {e}")),
    };

    let (result, missing_inputs) = run_compiler(compiler, input, optimize).await;
    match result {
        Ok(data) => WorkerMessage::Compiled {
            job,
            data: data.to_string(),
            missing_inputs,
        },
        Err(RunFault::Failed(message)) => WorkerMessage::Compiled {
            job,
            data: error_payload(format!("Uncaught compiler exception:\n{message}")).to_string(),
            missing_inputs,
        },
        Err(RunFault::Panicked(message)) => WorkerMessage::Error { data: message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ImportReply;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Echo;

    impl Compiler for Echo {
        fn version(&self) -> String {
            "0.4.11".to_string()
        }

        fn accepts_multiple_files(&self) -> bool {
            true
        }

        fn compile(
            &self,
            input: &CompilerInput,
            optimize: bool,
            _missing_import: &mut dyn FnMut(&str) -> ImportReply,
        ) -> BackendResult<Value> {
            match input {
                CompilerInput::Multi { sources } => Ok(json!({
                    "files": sources.len(),
                    "optimize": optimize,
                })),
                CompilerInput::Single(_) => Ok(json!({ "files": 1 })),
            }
        }
    }

    struct EchoLoader;

    #[async_trait]
    impl CompilerLoader for EchoLoader {
        async fn load(&self, url: &str) -> BackendResult<Arc<dyn Compiler>> {
            if url.ends_with(".js") {
                Ok(Arc::new(Echo))
            } else {
                Err(BackendError::Load {
                    url: url.to_string(),
                    reason: "not a compiler release".to_string(),
                })
            }
        }
    }

    fn spawn() -> WorkerChannels {
        LocalWorker::new(Arc::new(EchoLoader)).spawn().unwrap()
    }

    #[tokio::test]
    async fn loads_then_compiles() {
        let mut ch = spawn();
        ch.commands
            .send(WorkerCommand::LoadVersion {
                data: "soljson.js".to_string(),
            })
            .unwrap();
        assert_eq!(
            ch.messages.recv().await.unwrap(),
            WorkerMessage::VersionLoaded {
                data: "0.4.11".to_string(),
                accepts_multiple_files: true
            }
        );

        ch.commands
            .send(WorkerCommand::Compile {
                job: 5,
                source: json!({ "sources": { "A.sol": "a", "B.sol": "b" } }).to_string(),
                optimize: 1,
            })
            .unwrap();
        match ch.messages.recv().await.unwrap() {
            WorkerMessage::Compiled { job, data, .. } => {
                assert_eq!(job, 5);
                let data: Value = serde_json::from_str(&data).unwrap();
                assert_eq!(data, json!({ "files": 2, "optimize": true }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn compile_before_load_reports_not_loaded() {
        let mut ch = spawn();
        ch.commands
            .send(WorkerCommand::Compile {
                job: 0,
                source: "\"contract A {}\"".to_string(),
                optimize: 0,
            })
            .unwrap();
        match ch.messages.recv().await.unwrap() {
            WorkerMessage::Compiled { data, .. } => assert!(data.contains("Compiler not yet loaded.")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_load_is_an_error_message() {
        let mut ch = spawn();
        ch.commands
            .send(WorkerCommand::LoadVersion {
                data: "https://example.com/nope".to_string(),
            })
            .unwrap();
        match ch.messages.recv().await.unwrap() {
            WorkerMessage::Error { data } => assert!(data.contains("not a compiler release")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn worker_stops_when_commands_close() {
        let WorkerChannels {
            commands,
            mut messages,
        } = spawn();
        drop(commands);
        assert!(messages.recv().await.is_none());
    }
}
