//! Top-level compilation state machine.
//!
//! ```text
//! Idle -> Resolving -> BackendInvoked -> Done(Success)
//!            ^               |        \-> Done(Failure)
//!            +-- Retrying <--+
//! ```
//!
//! One [`CompilationOrchestrator`] owns its remote cache, its live backend and
//! its last result. Every compile attempt gets a number; loading a compiler or
//! starting a newer attempt supersedes the older one, whose completion is then
//! dropped without touching state or publishing events.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use source_store::{FileStore, RemoteFetcher};
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn, Instrument};

use crate::backend::{
    CompilerBackend, InProcessBackend, NotLoadedBackend, WorkerBackend, WorkerSpawner,
};
use crate::bundle::FileBundle;
use crate::compiler::CompilerLoader;
use crate::config::OrchestratorConfig;
use crate::diagnostics::{error_payload, has_fatal_errors};
use crate::error::{BackendError, BackendResult};
use crate::events::{CompilerEvent, EventBus};
use crate::metrics::METRICS;
use crate::obs;
use crate::resolver::{ImportResolver, RemoteCache};

/// The last terminal successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct LastCompilation {
    pub data: Value,
    pub sources: FileBundle,
}

/// What one finished attempt reported through `CompilationFinished`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationReport {
    pub success: bool,
    pub data: Value,
    pub sources: FileBundle,
}

/// Result of [`CompilationOrchestrator::compile`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    Finished(CompilationReport),
    /// A newer attempt or a compiler switch overtook this one.
    Superseded,
}

impl CompileOutcome {
    pub fn report(&self) -> Option<&CompilationReport> {
        match self {
            CompileOutcome::Finished(report) => Some(report),
            CompileOutcome::Superseded => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.report().map(|r| r.success).unwrap_or(false)
    }
}

/// Drives resolution, backend calls and the missing-input retry loop.
pub struct CompilationOrchestrator {
    store: Arc<dyn FileStore>,
    resolver: ImportResolver,
    events: EventBus,
    backend: Mutex<Arc<dyn CompilerBackend>>,
    loader: Option<Arc<dyn CompilerLoader>>,
    spawner: Option<Arc<dyn WorkerSpawner>>,
    optimize: AtomicBool,
    job_timeout: Option<Duration>,
    /// Number of the newest attempt; bumped by every compile and backend switch.
    attempt: AtomicU64,
    /// Bumped by every `load_version`.
    generation: AtomicU64,
    last: Mutex<Option<LastCompilation>>,
}

impl CompilationOrchestrator {
    pub fn new(
        store: Arc<dyn FileStore>,
        fetcher: Arc<dyn RemoteFetcher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            resolver: ImportResolver::new(Arc::clone(&store), fetcher),
            store,
            events: EventBus::new(config.event_capacity),
            backend: Mutex::new(Arc::new(NotLoadedBackend)),
            loader: None,
            spawner: None,
            optimize: AtomicBool::new(config.optimize),
            job_timeout: config.job_timeout,
            attempt: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }

    /// Loader used by `load_version(false, ..)`.
    pub fn with_loader(mut self, loader: Arc<dyn CompilerLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Spawner used by `load_version(true, ..)`.
    pub fn with_worker_spawner(mut self, spawner: Arc<dyn WorkerSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompilerEvent> {
        self.events.subscribe()
    }

    pub fn set_optimize(&self, optimize: bool) {
        self.optimize.store(optimize, Ordering::SeqCst);
    }

    pub fn optimize(&self) -> bool {
        self.optimize.load(Ordering::SeqCst)
    }

    /// Version of the live compiler, once it is ready.
    pub fn version(&self) -> Option<String> {
        self.current_backend().version()
    }

    pub fn remote_cache(&self) -> &RemoteCache {
        self.resolver.cache()
    }

    pub fn last_result(&self) -> Option<LastCompilation> {
        self.last.lock().unwrap().clone()
    }

    /// Make `backend` the live strategy.
    ///
    /// The previous backend is shut down and any attempt still running is
    /// superseded.
    pub fn install_backend(&self, backend: Arc<dyn CompilerBackend>) {
        let previous = std::mem::replace(&mut *self.backend.lock().unwrap(), backend);
        self.attempt.fetch_add(1, Ordering::SeqCst);
        previous.shutdown();
    }

    fn current_backend(&self) -> Arc<dyn CompilerBackend> {
        Arc::clone(&self.backend.lock().unwrap())
    }

    /// Load the compiler release at `url`, in this process or in a worker.
    ///
    /// Compiles fail fast with `Compiler not yet loaded.` until
    /// `CompilerLoaded` is published. For a worker that happens when it
    /// answers `versionLoaded`, after this returns.
    #[instrument(skip(self))]
    pub async fn load_version(&self, using_worker: bool, url: &str) -> BackendResult<()> {
        obs::emit_compiler_loading(url, using_worker);
        self.events.publish(CompilerEvent::LoadingCompiler {
            url: url.to_string(),
            using_worker,
        });

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.install_backend(Arc::new(NotLoadedBackend));

        if using_worker {
            let spawner = self
                .spawner
                .as_ref()
                .ok_or(BackendError::Unconfigured("worker"))?;
            let backend = match WorkerBackend::start(
                spawner.as_ref(),
                url,
                self.events.clone(),
                self.job_timeout,
            ) {
                Ok(backend) => backend,
                Err(e) => {
                    warn!(url = %url, error = %e, "compiler worker failed to start");
                    return Err(e);
                }
            };
            self.install_backend(Arc::new(backend));
            return Ok(());
        }

        let loader = self
            .loader
            .as_ref()
            .ok_or(BackendError::Unconfigured("in-process"))?;
        let compiler = match loader.load(url).await {
            Ok(compiler) => compiler,
            Err(e) => {
                warn!(url = %url, error = %e, "compiler failed to load");
                return Err(e);
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(url = %url, "discarding compiler from an overtaken load");
            return Ok(());
        }
        let version = compiler.version();
        self.install_backend(Arc::new(InProcessBackend::new(compiler)));
        obs::emit_compiler_loaded(&version);
        self.events.publish(CompilerEvent::CompilerLoaded { version });
        Ok(())
    }

    /// Compile the active file and everything it imports.
    ///
    /// Never fails: every problem ends as a `CompilationFinished` event with
    /// `success == false` and an `{"error": ...}` payload.
    pub async fn compile(&self) -> CompileOutcome {
        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
        self.run_attempt(attempt)
            .instrument(obs::compile_span(attempt))
            .await
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.attempt.load(Ordering::SeqCst) == attempt
    }

    async fn run_attempt(&self, attempt: u64) -> CompileOutcome {
        METRICS.inc_compilations_started();
        self.events.publish(CompilerEvent::CompilationStarted);

        let entry = match self.store.active_file_path().await {
            Ok(path) => path,
            Err(e) => return self.fail(attempt, e.to_string(), FileBundle::new()),
        };
        let content = match self.store.active_file_content().await {
            Ok(content) => content,
            Err(e) => return self.fail(attempt, e.to_string(), FileBundle::new()),
        };
        obs::emit_compilation_started(attempt, &entry);

        let mut sources = FileBundle::single(entry.clone(), content);
        let mut hints = Vec::new();
        let mut requested = HashSet::new();

        loop {
            let backend = self.current_backend();
            let resolved = match self
                .resolver
                .resolve(sources.clone(), hints, backend.accepts_multiple_files(), &entry)
                .await
            {
                Ok(resolved) => resolved,
                Err(e) => return self.fail(attempt, e.to_string(), sources),
            };
            if !self.is_current(attempt) {
                return self.superseded(attempt);
            }

            let completion = match backend
                .compile(resolved.input, resolved.sources, self.optimize())
                .await
            {
                Ok(completion) => completion,
                Err(e) if !self.is_current(attempt) => {
                    debug!(error = %e, "backend dropped a superseded attempt");
                    return self.superseded(attempt);
                }
                Err(e) => return self.fail(attempt, e.to_string(), sources),
            };

            if has_fatal_errors(&completion.data) {
                return self.finish(attempt, false, completion.data, completion.sources);
            }
            if completion.missing_inputs.is_empty() {
                return self.finish(attempt, true, completion.data, completion.sources);
            }

            let fresh: Vec<String> = completion
                .missing_inputs
                .iter()
                .filter(|path| requested.insert(path.to_string()))
                .cloned()
                .collect();
            if fresh.is_empty() {
                let message = format!(
                    "Compiler kept reporting missing inputs: {}",
                    completion.missing_inputs.join(", ")
                );
                return self.fail(attempt, message, completion.sources);
            }

            METRICS.inc_missing_input_retries();
            obs::emit_missing_input_retry(attempt, &fresh);
            sources = completion.sources;
            hints = fresh;
        }
    }

    fn superseded(&self, attempt: u64) -> CompileOutcome {
        obs::emit_compilation_superseded(attempt);
        CompileOutcome::Superseded
    }

    fn fail(&self, attempt: u64, message: String, sources: FileBundle) -> CompileOutcome {
        self.finish(attempt, false, error_payload(message), sources)
    }

    fn finish(
        &self,
        attempt: u64,
        success: bool,
        data: Value,
        sources: FileBundle,
    ) -> CompileOutcome {
        {
            let mut last = self.last.lock().unwrap();
            if !self.is_current(attempt) {
                drop(last);
                return self.superseded(attempt);
            }
            *last = success.then(|| LastCompilation {
                data: data.clone(),
                sources: sources.clone(),
            });
        }
        if !success {
            METRICS.inc_compilations_failed();
        }

        obs::emit_compilation_finished(attempt, success, sources.len(), &sources.digest());
        self.events.publish(CompilerEvent::CompilationFinished {
            success,
            data: data.clone(),
            sources: sources.clone(),
        });
        CompileOutcome::Finished(CompilationReport {
            success,
            data,
            sources,
        })
    }
}

impl Drop for CompilationOrchestrator {
    fn drop(&mut self) {
        if let Ok(backend) = self.backend.lock() {
            backend.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendCompletion;
    use crate::bundle::CompilerInput;
    use async_trait::async_trait;
    use serde_json::json;
    use source_store::fakes::{MemoryFetcher, MemoryFileStore};

    /// Backend answering from a fixed list of completions, one per call.
    struct Canned {
        replies: Mutex<Vec<(Value, Vec<String>)>>,
        seen: Mutex<Vec<FileBundle>>,
    }

    impl Canned {
        fn new(replies: Vec<(Value, Vec<&str>)>) -> Arc<Self> {
            let replies = replies
                .into_iter()
                .rev()
                .map(|(data, missing)| (data, missing.into_iter().map(String::from).collect()))
                .collect();
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompilerBackend for Canned {
        fn version(&self) -> Option<String> {
            Some("0.4.11".to_string())
        }

        fn accepts_multiple_files(&self) -> bool {
            true
        }

        async fn compile(
            &self,
            _input: CompilerInput,
            sources: FileBundle,
            _optimize: bool,
        ) -> BackendResult<BackendCompletion> {
            self.seen.lock().unwrap().push(sources.clone());
            let (data, missing_inputs) = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or((json!({ "contracts": {} }), vec![]));
            Ok(BackendCompletion {
                data,
                missing_inputs,
                sources,
            })
        }
    }

    fn orchestrator(store: MemoryFileStore) -> CompilationOrchestrator {
        CompilationOrchestrator::new(
            Arc::new(store),
            Arc::new(MemoryFetcher::new()),
            OrchestratorConfig::default(),
        )
    }

    fn store_with_active(path: &str, content: &str) -> MemoryFileStore {
        let store = MemoryFileStore::with_files([(path, content)]);
        store.set_active(path);
        store
    }

    #[tokio::test]
    async fn starts_not_loaded() {
        let orch = orchestrator(store_with_active("A.sol", "contract A {}"));
        assert!(orch.version().is_none());

        let outcome = orch.compile().await;
        let report = outcome.report().unwrap();
        assert!(!report.success);
        assert_eq!(report.data["error"], "Compiler not yet loaded.");
        assert!(orch.last_result().is_none());
    }

    #[tokio::test]
    async fn success_is_stored_as_last_result() {
        let orch = orchestrator(store_with_active("A.sol", "contract A {}"));
        orch.install_backend(Canned::new(vec![(json!({ "contracts": { "A": {} } }), vec![])]));

        let outcome = orch.compile().await;
        assert!(outcome.is_success());
        let last = orch.last_result().unwrap();
        assert!(last.data["contracts"]["A"].is_object());
        assert_eq!(last.sources, FileBundle::single("A.sol", "contract A {}"));
    }

    #[tokio::test]
    async fn fatal_error_clears_last_result() {
        let orch = orchestrator(store_with_active("A.sol", "contract A {}"));
        let backend = Canned::new(vec![
            (json!({ "contracts": {} }), vec![]),
            (json!({ "errors": ["A.sol:1:1: Error: Expected pragma"] }), vec![]),
        ]);
        orch.install_backend(backend);

        assert!(orch.compile().await.is_success());
        assert!(orch.last_result().is_some());
        assert!(!orch.compile().await.is_success());
        assert!(orch.last_result().is_none());
    }

    #[tokio::test]
    async fn repeated_missing_inputs_stop_the_loop() {
        let store = store_with_active("A.sol", "contract A {}");
        store.insert("X.sol", "contract X {}");
        let orch = orchestrator(store);
        let backend = Canned::new(vec![
            (json!({ "errors": ["Deferred import"] }), vec!["X.sol"]),
            (json!({ "errors": ["Deferred import"] }), vec!["X.sol"]),
        ]);
        orch.install_backend(backend.clone());

        let outcome = orch.compile().await;
        let report = outcome.report().unwrap();
        assert!(!report.success);
        assert_eq!(
            report.data["error"],
            "Compiler kept reporting missing inputs: X.sol"
        );
        assert_eq!(backend.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn optimize_flag_toggles() {
        let orch = orchestrator(MemoryFileStore::new());
        assert!(!orch.optimize());
        orch.set_optimize(true);
        assert!(orch.optimize());
    }

    #[tokio::test]
    async fn missing_active_file_is_a_failure_event() {
        let orch = orchestrator(MemoryFileStore::new());
        let mut events = orch.subscribe();
        orch.install_backend(Canned::new(vec![]));

        let outcome = orch.compile().await;
        assert!(!outcome.is_success());
        assert_eq!(events.recv().await.unwrap(), CompilerEvent::CompilationStarted);
        match events.recv().await.unwrap() {
            CompilerEvent::CompilationFinished { success, data, .. } => {
                assert!(!success);
                assert!(data["error"].is_string());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn finished_attempt_is_logged_with_digest() {
        let orch = orchestrator(store_with_active("A.sol", "contract A {}"));
        orch.install_backend(Canned::new(vec![]));
        assert!(orch.compile().await.is_success());

        let digest = FileBundle::single("A.sol", "contract A {}").digest();
        assert!(logs_contain("compile.started"));
        assert!(logs_contain("compile.finished"));
        assert!(logs_contain(&digest));
    }

    struct BrokenSpawner;

    impl WorkerSpawner for BrokenSpawner {
        fn spawn(&self) -> BackendResult<crate::backend::WorkerChannels> {
            Err(BackendError::Spawn("no such program".to_string()))
        }
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn worker_spawn_failure_is_logged() {
        let orch = orchestrator(MemoryFileStore::new()).with_worker_spawner(Arc::new(BrokenSpawner));
        let err = orch.load_version(true, "soljson.js").await.unwrap_err();
        assert!(matches!(err, BackendError::Spawn(_)));
        assert!(orch.version().is_none());
        assert!(logs_contain("compiler worker failed to start"));
    }

    #[tokio::test]
    async fn unconfigured_modes_are_errors() {
        let orch = orchestrator(MemoryFileStore::new());
        assert!(matches!(
            orch.load_version(false, "soljson.js").await,
            Err(BackendError::Unconfigured("in-process"))
        ));
        assert!(matches!(
            orch.load_version(true, "soljson.js").await,
            Err(BackendError::Unconfigured("worker"))
        ));
    }
}
