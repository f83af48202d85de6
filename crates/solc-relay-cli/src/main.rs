//! solc-relay CLI
//!
//! Compiles one Solidity file from a directory, gathering its local and
//! GitHub-hosted imports, through a compiler worker process. The final result
//! JSON goes to stdout; logs go to stderr.
//!
//! ```text
//! solc-relay --root contracts --entry Token.sol \
//!     --worker "node solc-worker.js" \
//!     --compiler-url https://binaries.soliditylang.org/bin/soljson-v0.4.11.js
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use github_fetch::GithubFetcher;
use solc_relay_core::metrics::METRICS;
use solc_relay_core::{CompilationOrchestrator, CompilerEvent, OrchestratorConfig, ProcessWorker};
use source_store::DirFileStore;
use tokio::sync::broadcast;
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "solc-relay")]
#[command(author = "Stevedores Org")]
#[command(version = solc_relay_core::VERSION)]
#[command(about = "Compile Solidity sources and their imports through a compiler worker", long_about = None)]
struct Cli {
    /// Directory local imports are resolved against
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// File to compile, relative to --root
    #[arg(long)]
    entry: String,

    /// Command line of the worker process
    #[arg(long, env = "SOLC_RELAY_WORKER")]
    worker: String,

    /// Compiler release the worker should load
    #[arg(long, env = "SOLC_RELAY_COMPILER_URL")]
    compiler_url: String,

    /// Ask the compiler to optimise
    #[arg(long)]
    optimize: bool,

    /// Give up on a compile job after this many seconds
    #[arg(long)]
    job_timeout_secs: Option<u64>,

    /// Give up waiting for the compiler to load after this many seconds
    #[arg(long, default_value_t = 120)]
    load_timeout_secs: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn orchestrator_config(&self) -> OrchestratorConfig {
        let config = OrchestratorConfig::default().with_optimize(self.optimize);
        match self.job_timeout_secs {
            Some(secs) => config.with_job_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

/// Wait for `CompilerLoaded` and return the reported version.
///
/// A failed `CompilationFinished` before then means the worker gave up
/// loading, and its error is returned.
async fn wait_for_compiler(
    events: &mut broadcast::Receiver<CompilerEvent>,
    limit: Duration,
) -> Result<String> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(CompilerEvent::CompilerLoaded { version }) => return Ok(version),
                Ok(CompilerEvent::CompilationFinished {
                    success: false,
                    data,
                    ..
                }) => {
                    let reason = data["error"].as_str().unwrap_or("unknown error");
                    bail!("Compiler failed to load: {reason}")
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    bail!("event stream closed before the compiler loaded")
                }
            }
        }
    };
    tokio::time::timeout(limit, wait)
        .await
        .with_context(|| format!("Compiler did not load within {}s", limit.as_secs()))?
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    solc_relay_core::telemetry::init_tracing(cli.json, level);

    let store = DirFileStore::new(&cli.root)
        .with_context(|| format!("Failed to open source root {}", cli.root.display()))?;
    store.set_active(cli.entry.as_str());
    let fetcher = GithubFetcher::from_env().context("Failed to configure GitHub fetcher")?;
    let worker = ProcessWorker::from_command_line(&cli.worker)
        .context("--worker must name a program to run")?;

    let orchestrator = CompilationOrchestrator::new(
        Arc::new(store),
        Arc::new(fetcher),
        cli.orchestrator_config(),
    )
    .with_worker_spawner(Arc::new(worker));
    let mut events = orchestrator.subscribe();

    orchestrator
        .load_version(true, &cli.compiler_url)
        .await
        .context("Failed to start compiler worker")?;
    let load_timeout = Duration::from_secs(cli.load_timeout_secs);
    let version = wait_for_compiler(&mut events, load_timeout).await?;
    info!(version = %version, "compiler ready");

    let outcome = orchestrator.compile().await;
    METRICS.flush();

    let report = outcome.report().context("Compilation was superseded")?;
    println!("{}", serde_json::to_string_pretty(&report.data)?);
    info!(
        files = report.sources.len(),
        digest = %report.sources.digest(),
        "compilation finished"
    );

    if !report.success {
        bail!("Compilation of {} failed", cli.entry);
    }
    Ok(())
}
