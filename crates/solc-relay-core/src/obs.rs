//! Structured observability hooks for the compilation lifecycle.
//!
//! This module provides:
//! - Attempt-scoped tracing spans via [`compile_span`]
//! - Emission functions for key lifecycle events: loading, start, retry,
//!   remote fetch, finish
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).

use tracing::{info, warn, Span};

/// Span tagged with the compile attempt number.
///
/// Attach it with `Instrument::instrument` so every log line produced while
/// resolving and compiling carries `attempt`.
pub fn compile_span(attempt: u64) -> Span {
    tracing::info_span!("solc_relay.compile", attempt = attempt)
}

/// Emit event: a compiler is being loaded.
pub fn emit_compiler_loading(url: &str, using_worker: bool) {
    info!(event = "compiler.loading", url = %url, using_worker = using_worker);
}

/// Emit event: a compiler reported its version and is ready.
pub fn emit_compiler_loaded(version: &str) {
    info!(event = "compiler.loaded", version = %version);
}

/// Emit event: compilation started from the active file.
pub fn emit_compilation_started(attempt: u64, entry: &str) {
    info!(event = "compile.started", attempt = attempt, entry = %entry);
}

/// Emit event: the backend asked for more files and the attempt loops.
pub fn emit_missing_input_retry(attempt: u64, paths: &[String]) {
    info!(
        event = "compile.retry",
        attempt = attempt,
        missing = paths.len(),
        paths = ?paths,
    );
}

/// Emit event: a remote import was fetched.
///
/// `cached` is true when the session cache served it.
pub fn emit_import_fetched(path: &str, bytes: usize, cached: bool) {
    info!(event = "import.fetched", path = %path, bytes = bytes, cached = cached);
}

/// Emit event: compilation finished.
pub fn emit_compilation_finished(attempt: u64, success: bool, files: usize, digest: &str) {
    info!(
        event = "compile.finished",
        attempt = attempt,
        success = success,
        files = files,
        bundle_digest = %digest,
    );
}

/// Emit event: an attempt lost to a newer one (warning level).
pub fn emit_compilation_superseded(attempt: u64) {
    warn!(event = "compile.superseded", attempt = attempt);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_span_create() {
        let span = compile_span(7);
        let _entered = span.enter();
    }
}
