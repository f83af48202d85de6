//! Lifecycle notifications published by the orchestrator.
//!
//! Listeners subscribe to a [`tokio::sync::broadcast`] channel. Publishing is
//! fire-and-forget: no subscribers is fine, and a lagging subscriber only
//! loses its own backlog.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use crate::bundle::FileBundle;

/// Default channel capacity for [`EventBus::new`].
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Observable lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CompilerEvent {
    LoadingCompiler {
        url: String,
        #[serde(rename = "usingWorker")]
        using_worker: bool,
    },
    CompilerLoaded {
        version: String,
    },
    CompilationStarted,
    CompilationFinished {
        success: bool,
        data: Value,
        sources: FileBundle,
    },
}

impl CompilerEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CompilerEvent::LoadingCompiler { .. } => "loadingCompiler",
            CompilerEvent::CompilerLoaded { .. } => "compilerLoaded",
            CompilerEvent::CompilationStarted => "compilationStarted",
            CompilerEvent::CompilationFinished { .. } => "compilationFinished",
        }
    }
}

/// Cloneable publishing side of the lifecycle channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CompilerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompilerEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: CompilerEvent) {
        let name = event.name();
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(event = name, receivers = receivers, "published");
    }
}
