use std::time::Duration;

use crate::events::DEFAULT_EVENT_CAPACITY;

/// Settings for a [`CompilationOrchestrator`](crate::CompilationOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Ask the compiler to optimise. Can be flipped later with `set_optimize`.
    pub optimize: bool,
    /// Give up on a worker job that has not answered after this long.
    pub job_timeout: Option<Duration>,
    /// Events buffered per subscriber before a slow one starts lagging.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            optimize: false,
            job_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }
}
