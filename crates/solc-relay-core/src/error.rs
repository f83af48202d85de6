//! Error taxonomy for import resolution and compiler backends.

/// Why an import could not be added to the bundle.
///
/// The display form is what callers see in the `error` field of a failed
/// compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("Unable to import \"{path}\": Unsupported URL")]
    UnsupportedUrl { path: String },

    #[error("Unable to import \"{path}\": File not found")]
    NotFound { path: String },

    #[error("Unable to import \"{path}\": {reason}")]
    Fetch { path: String, reason: String },
}

impl ImportError {
    /// The import path that failed.
    pub fn path(&self) -> &str {
        match self {
            ImportError::UnsupportedUrl { path }
            | ImportError::NotFound { path }
            | ImportError::Fetch { path, .. } => path,
        }
    }
}

/// Compiler backend errors.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Compiler not yet loaded.")]
    NotLoaded,

    #[error("no compiler loader configured for {0} mode")]
    Unconfigured(&'static str),

    #[error("failed to load compiler from {url}: {reason}")]
    Load { url: String, reason: String },

    #[error("failed to start worker: {0}")]
    Spawn(String),

    /// The worker holding this job was torn down before it answered.
    #[error("compile job {job} was abandoned")]
    JobAbandoned { job: u64 },

    #[error("{0}")]
    Compiler(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
