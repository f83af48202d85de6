//! Global atomic counters for solc-relay observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a CLI run ends).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Atomic counters, no allocation or locking.
pub struct Metrics {
    compilations_started: AtomicU64,
    compilations_failed: AtomicU64,
    remote_fetches: AtomicU64,
    remote_cache_hits: AtomicU64,
    missing_input_retries: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            compilations_started: AtomicU64::new(0),
            compilations_failed: AtomicU64::new(0),
            remote_fetches: AtomicU64::new(0),
            remote_cache_hits: AtomicU64::new(0),
            missing_input_retries: AtomicU64::new(0),
        }
    }

    pub fn inc_compilations_started(&self) {
        self.compilations_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "compilations_started", "counter incremented");
    }

    pub fn inc_compilations_failed(&self) {
        self.compilations_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "compilations_failed", "counter incremented");
    }

    pub fn inc_remote_fetches(&self) {
        self.remote_fetches.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "remote_fetches", "counter incremented");
    }

    pub fn inc_remote_cache_hits(&self) {
        self.remote_cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "remote_cache_hits", "counter incremented");
    }

    pub fn inc_missing_input_retries(&self) {
        self.missing_input_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "missing_input_retries", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            compilations_started = self.compilations_started(),
            compilations_failed = self.compilations_failed(),
            remote_fetches = self.remote_fetches(),
            remote_cache_hits = self.remote_cache_hits(),
            missing_input_retries = self.missing_input_retries(),
        );
    }

    pub fn compilations_started(&self) -> u64 {
        self.compilations_started.load(Ordering::Relaxed)
    }

    pub fn compilations_failed(&self) -> u64 {
        self.compilations_failed.load(Ordering::Relaxed)
    }

    pub fn remote_fetches(&self) -> u64 {
        self.remote_fetches.load(Ordering::Relaxed)
    }

    pub fn remote_cache_hits(&self) -> u64 {
        self.remote_cache_hits.load(Ordering::Relaxed)
    }

    pub fn missing_input_retries(&self) -> u64 {
        self.missing_input_retries.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.compilations_started.store(0, Ordering::Relaxed);
        self.compilations_failed.store(0, Ordering::Relaxed);
        self.remote_fetches.store(0, Ordering::Relaxed);
        self.remote_cache_hits.store(0, Ordering::Relaxed);
        self.missing_input_retries.store(0, Ordering::Relaxed);
    }
}
