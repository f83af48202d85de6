//! Worker strategy: jobs posted over channels, answers matched by job id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::protocol::{WorkerCommand, WorkerMessage};
use super::{BackendCompletion, CompilerBackend};
use crate::bundle::{CompilerInput, FileBundle};
use crate::diagnostics::error_payload;
use crate::error::{BackendError, BackendResult};
use crate::events::{CompilerEvent, EventBus};
use crate::obs;

/// Both ends of a freshly spawned worker.
#[derive(Debug)]
pub struct WorkerChannels {
    pub commands: mpsc::UnboundedSender<WorkerCommand>,
    pub messages: mpsc::UnboundedReceiver<WorkerMessage>,
}

/// Starts workers. Each call yields an independent worker.
///
/// Dropping the `commands` sender must stop the worker.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self) -> BackendResult<WorkerChannels>;
}

struct PendingJob {
    sources: FileBundle,
    reply: oneshot::Sender<BackendCompletion>,
}

#[derive(Default)]
struct WorkerState {
    version: Option<String>,
    accepts_multiple_files: bool,
    next_job: u64,
    jobs: HashMap<u64, PendingJob>,
}

impl WorkerState {
    fn fail_pending(&mut self, message: &str) {
        for (job, pending) in self.jobs.drain() {
            debug!(job = job, "failing pending job");
            let _ = pending
                .reply
                .send(BackendCompletion::failed(message, pending.sources));
        }
    }
}

/// Strategy that talks to a worker.
///
/// Not ready until the worker answers `versionLoaded`; compiles before then
/// fail fast with `Compiler not yet loaded.`.
pub struct WorkerBackend {
    state: Arc<Mutex<WorkerState>>,
    commands: Mutex<Option<mpsc::UnboundedSender<WorkerCommand>>>,
    router: Mutex<Option<JoinHandle<()>>>,
    job_timeout: Option<Duration>,
}

impl WorkerBackend {
    /// Spawn a worker and ask it to load the compiler at `url`.
    ///
    /// `CompilerLoaded` is published on `events` once the worker reports its
    /// version.
    #[instrument(skip(spawner, events, job_timeout))]
    pub fn start(
        spawner: &dyn WorkerSpawner,
        url: &str,
        events: EventBus,
        job_timeout: Option<Duration>,
    ) -> BackendResult<Self> {
        let WorkerChannels { commands, messages } = spawner.spawn()?;
        let state = Arc::new(Mutex::new(WorkerState::default()));
        let router = tokio::spawn(route(messages, Arc::clone(&state), events));

        let load = WorkerCommand::LoadVersion {
            data: url.to_string(),
        };
        if commands.send(load).is_err() {
            router.abort();
            return Err(BackendError::Spawn(
                "worker exited before loading".to_string(),
            ));
        }

        Ok(Self {
            state,
            commands: Mutex::new(Some(commands)),
            router: Mutex::new(Some(router)),
            job_timeout,
        })
    }

    /// Jobs posted and not yet answered.
    pub fn pending_jobs(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    fn take_job(&self, job: u64) -> Option<FileBundle> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .remove(&job)
            .map(|pending| pending.sources)
    }
}

#[async_trait]
impl CompilerBackend for WorkerBackend {
    fn version(&self) -> Option<String> {
        self.state.lock().unwrap().version.clone()
    }

    fn accepts_multiple_files(&self) -> bool {
        self.state.lock().unwrap().accepts_multiple_files
    }

    #[instrument(skip_all, fields(files = sources.len()))]
    async fn compile(
        &self,
        input: CompilerInput,
        sources: FileBundle,
        optimize: bool,
    ) -> BackendResult<BackendCompletion> {
        let source = match serde_json::to_string(&input) {
            Ok(s) => s,
            Err(e) => {
                return Ok(BackendCompletion::failed(
                    format!("Worker error: cannot encode input: {e}"),
                    sources,
                ))
            }
        };

        let (job, answer) = {
            let mut state = self.state.lock().unwrap();
            if state.version.is_none() {
                return Ok(BackendCompletion::failed(
                    BackendError::NotLoaded.to_string(),
                    sources,
                ));
            }
            let job = state.next_job;
            state.next_job += 1;
            let (reply, answer) = oneshot::channel();
            state.jobs.insert(
                job,
                PendingJob {
                    sources: sources.clone(),
                    reply,
                },
            );
            (job, answer)
        };

        let command = WorkerCommand::Compile {
            job,
            source,
            optimize: u8::from(optimize),
        };
        let sent = self
            .commands
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.send(command).is_ok())
            .unwrap_or(false);
        if !sent {
            self.take_job(job);
            return Ok(BackendCompletion::failed(
                "Worker error: worker is not running",
                sources,
            ));
        }
        debug!(job = job, "compile job posted");

        let answer = match self.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, answer).await {
                Ok(answer) => answer,
                Err(_) => {
                    self.take_job(job);
                    warn!(job = job, "compile job timed out");
                    return Ok(BackendCompletion::failed(
                        format!("Worker error: compile job {job} timed out"),
                        sources,
                    ));
                }
            },
            None => answer.await,
        };

        answer.map_err(|_| BackendError::JobAbandoned { job })
    }

    fn shutdown(&self) {
        // Stop routing first so the worker exiting is not reported as a fault.
        if let Some(router) = self.router.lock().unwrap().take() {
            router.abort();
        }
        self.commands.lock().unwrap().take();
        let abandoned = {
            let mut state = self.state.lock().unwrap();
            let n = state.jobs.len();
            state.jobs.clear();
            n
        };
        debug!(abandoned = abandoned, "worker torn down");
    }
}

impl Drop for WorkerBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn route(
    mut messages: mpsc::UnboundedReceiver<WorkerMessage>,
    state: Arc<Mutex<WorkerState>>,
    events: EventBus,
) {
    while let Some(message) = messages.recv().await {
        match message {
            WorkerMessage::VersionLoaded {
                data,
                accepts_multiple_files,
            } => {
                {
                    let mut state = state.lock().unwrap();
                    state.version = Some(data.clone());
                    state.accepts_multiple_files = accepts_multiple_files;
                }
                obs::emit_compiler_loaded(&data);
                events.publish(CompilerEvent::CompilerLoaded { version: data });
            }
            WorkerMessage::Compiled {
                job,
                data,
                missing_inputs,
            } => {
                let pending = state.lock().unwrap().jobs.remove(&job);
                let Some(pending) = pending else {
                    warn!(job = job, "dropping answer for unknown job");
                    continue;
                };
                let data = serde_json::from_str(&data).unwrap_or_else(|e| {
                    error_payload(format!("Invalid JSON output from the compiler: {e}"))
                });
                let _ = pending.reply.send(BackendCompletion {
                    data,
                    missing_inputs,
                    sources: pending.sources,
                });
            }
            WorkerMessage::Error { data } => {
                warn!(error = %data, "worker reported an error");
                report_fault(&state, &events, &format!("Worker error: {data}"));
            }
        }
    }
    warn!("worker exited");
    report_fault(&state, &events, "Worker error: worker exited");
}

/// Fail every pending job with `message`.
///
/// With nothing pending (a failed `loadVersion`, say) the failure is
/// published directly as a failed `CompilationFinished` with no sources.
fn report_fault(state: &Mutex<WorkerState>, events: &EventBus, message: &str) {
    let idle = {
        let mut state = state.lock().unwrap();
        let idle = state.jobs.is_empty();
        state.fail_pending(message);
        idle
    };
    if idle {
        events.publish(CompilerEvent::CompilationFinished {
            success: false,
            data: error_payload(message),
            sources: FileBundle::new(),
        });
    }
}
