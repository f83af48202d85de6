//! Import gathering.
//!
//! [`ImportResolver::resolve`] grows a bundle until every `import` it contains
//! is satisfied, looking each path up in order in:
//! 1. the bundle itself
//! 2. the local file store
//! 3. the session's remote cache
//! 4. GitHub, for `github.com/<owner>/<repo>/<path>` references
//!
//! Only imports that open a line are recognised (`import "<path>";` or
//! `import '<path>';`, optionally indented). Anything else on the line before
//! the keyword hides the import.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use source_store::{FileStore, RemoteFetcher};
use tracing::{debug, instrument};

use crate::bundle::{CompilerInput, FileBundle};
use crate::error::ImportError;
use crate::metrics::METRICS;
use crate::obs;

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*import\s*['"]([^'"]+)['"];"#).expect("static regex")
    })
}

fn github_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(https?://)?(www\.)?github\.com/([^/]*/[^/]*)/(.*)").expect("static regex")
    })
}

fn url_scheme_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^:]*://").expect("static regex"))
}

/// Import paths found in `source`, in order of appearance, with a leading
/// `./` removed.
pub fn scan_imports(source: &str) -> Vec<String> {
    import_regex()
        .captures_iter(source)
        .map(|caps| {
            let path = &caps[1];
            path.strip_prefix("./").unwrap_or(path).to_string()
        })
        .collect()
}

/// A repository-hosted import split into repository and in-repo path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// `"<owner>/<repo>"`
    pub owner_repo: String,
    pub path: String,
}

impl RemoteRef {
    /// Parse `[http[s]://][www.]github.com/<owner>/<repo>/<path>`.
    pub fn parse(import: &str) -> Option<Self> {
        github_regex().captures(import).map(|caps| RemoteRef {
            owner_repo: caps[3].to_string(),
            path: caps[4].to_string(),
        })
    }
}

/// Process-lifetime memo of fetched remote content, keyed by import path.
///
/// Append-only: entries are never evicted or replaced.
#[derive(Debug, Default)]
pub struct RemoteCache {
    entries: Mutex<HashMap<String, String>>,
}

impl RemoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Store `content` under `key` unless something is already there.
    pub fn insert(&self, key: &str, content: &str) {
        self.entries
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert_with(|| content.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    /// What the backend will be given.
    pub input: CompilerInput,
    /// Every file gathered, including the ones it started with.
    pub sources: FileBundle,
}

/// Where a path's content came from.
enum Source {
    Local(String),
    Cached(String),
    Fetched(String),
}

/// Grows bundles until their imports are satisfied.
pub struct ImportResolver {
    store: Arc<dyn FileStore>,
    fetcher: Arc<dyn RemoteFetcher>,
    cache: RemoteCache,
}

impl ImportResolver {
    pub fn new(store: Arc<dyn FileStore>, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            store,
            fetcher,
            cache: RemoteCache::new(),
        }
    }

    pub fn cache(&self) -> &RemoteCache {
        &self.cache
    }

    /// Resolve `bundle` plus `hints` into a compiler input.
    ///
    /// With `accepts_multiple_files == false` nothing is scanned and the
    /// content of `entry` is returned as a single source.
    ///
    /// Hints are drained last-in first-out. Every fetched remote file forces a
    /// rescan before the remaining hints are drained, since it may bring its
    /// own imports. On error the caller's bundle is untouched.
    #[instrument(skip(self, bundle, hints), fields(files = bundle.len(), hints = hints.len()))]
    pub async fn resolve(
        &self,
        bundle: FileBundle,
        hints: Vec<String>,
        accepts_multiple_files: bool,
        entry: &str,
    ) -> Result<ResolvedInput, ImportError> {
        if !accepts_multiple_files {
            let source = bundle.get(entry).unwrap_or_default().to_string();
            return Ok(ResolvedInput {
                input: CompilerInput::Single(source),
                sources: bundle,
            });
        }

        let mut bundle = bundle;
        let mut hints = hints;

        loop {
            for (_, content) in bundle.iter() {
                for path in scan_imports(content) {
                    if !hints.contains(&path) {
                        hints.push(path);
                    }
                }
            }

            let mut grew = false;
            while let Some(path) = hints.pop() {
                if bundle.contains(&path) {
                    continue;
                }
                match self.lookup(&path).await? {
                    Source::Local(content) | Source::Cached(content) => {
                        bundle.add(path, content);
                        grew = true;
                    }
                    Source::Fetched(content) => {
                        bundle.add(path, content);
                        grew = true;
                        break;
                    }
                }
            }

            if !grew {
                break;
            }
        }

        debug!(files = bundle.len(), "imports resolved");
        Ok(ResolvedInput {
            input: CompilerInput::multi(bundle.clone()),
            sources: bundle,
        })
    }

    async fn lookup(&self, path: &str) -> Result<Source, ImportError> {
        if self.store.has_file(path).await {
            return self
                .store
                .get_file(path)
                .await
                .map(Source::Local)
                .map_err(|e| ImportError::Fetch {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
        }

        if let Some(content) = self.cache.get(path) {
            METRICS.inc_remote_cache_hits();
            obs::emit_import_fetched(path, content.len(), true);
            return Ok(Source::Cached(content));
        }

        if let Some(remote) = RemoteRef::parse(path) {
            METRICS.inc_remote_fetches();
            let content = self
                .fetcher
                .fetch(&remote.owner_repo, &remote.path)
                .await
                .map_err(|e| ImportError::Fetch {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
            obs::emit_import_fetched(path, content.len(), false);
            self.cache.insert(path, &content);
            return Ok(Source::Fetched(content));
        }

        if url_scheme_regex().is_match(path) {
            return Err(ImportError::UnsupportedUrl {
                path: path.to_string(),
            });
        }

        Err(ImportError::NotFound {
            path: path.to_string(),
        })
    }
}
