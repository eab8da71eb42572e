//! Indexing job coordinator
//!
//! Runs one repository pass in two phases:
//!
//! 1. **Extraction**: every [`SourceFile`] is parsed on the rayon pool
//!    (thread-local parsers) into a [`FileExtraction`]. Results are merged
//!    into a [`GraphAccumulator`] in input order, so the outcome does not
//!    depend on scheduling.
//! 2. **Linking**: call sites are linked sequentially against the complete
//!    node set, in batches.
//!
//! The accumulated graph is then written through the [`GraphStore`] in
//! batches. Writes are idempotent: re-running a job over unchanged input only
//! refreshes timestamps, and re-running a cancelled job completes it.
//!
//! # Cancellation
//!
//! A [`CancellationFlag`] is checked before each file in phase 1 and before
//! each link batch in phase 2. Work finished before the flag was set is still
//! persisted.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::IndexConfig;
use crate::error::{ExtractionError, PersistenceError};
use crate::graph::accumulator::{FallbackTarget, PendingCall};
use crate::graph::{GraphAccumulator, RepoScope, RepositorySummary};
use crate::ingest::{extract_file, FileExtraction, Language};
use crate::output::generate_execution_id;
use crate::resolve::SymbolResolver;
use crate::store::{BatchError, BatchOutcome, GraphStore, RunCounters, RunOutcome};

/// Directories never descended into during discovery
const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Shared cooperative cancellation signal
///
/// Cloning shares the flag; setting it from any clone (a signal handler, a
/// test) is seen by every holder.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for registering with signal handlers
    pub fn as_arc(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// One input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Repo-relative path, `/`-separated
    pub path: String,
    pub bytes: Vec<u8>,
    pub language: Language,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>, language: Language) -> Self {
        SourceFile {
            path: path.into(),
            bytes: bytes.into(),
            language,
        }
    }
}

/// A file phase 1 did not index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub code: String,
    pub message: String,
}

/// Outcome of one indexing job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    pub execution_id: String,
    pub scope: Option<RepoScope>,
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub skipped: Vec<SkippedFile>,
    /// Call edges linked to a real definition (including through the resolver)
    pub functions_linked: usize,
    pub resolved_by_fallback: usize,
    /// Call edges pointing at external placeholders
    pub unresolved_calls: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
    pub persistence_errors: Vec<BatchError>,
    pub cancelled: bool,
    pub summary: RepositorySummary,
    pub elapsed_ms: u64,
}

impl IndexReport {
    fn outcome(&self) -> RunOutcome {
        if self.cancelled {
            RunOutcome::Cancelled
        } else if self.files_skipped > 0 || !self.persistence_errors.is_empty() {
            RunOutcome::Partial
        } else {
            RunOutcome::Success
        }
    }

    fn counters(&self) -> RunCounters {
        RunCounters {
            files_seen: self.files_seen,
            files_indexed: self.files_indexed,
            files_skipped: self.files_skipped,
            nodes_written: self.nodes_written,
            edges_written: self.edges_written,
            errors: self.persistence_errors.len(),
        }
    }
}

/// Drives indexing jobs against one store
#[derive(Debug)]
pub struct Indexer<'a> {
    store: &'a GraphStore,
    config: IndexConfig,
    resolver: SymbolResolver,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a GraphStore, config: IndexConfig) -> Self {
        Indexer {
            store,
            config,
            resolver: SymbolResolver::new(),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Index `files` into `scope`
    ///
    /// Per-file extraction failures and per-batch store errors are recorded in
    /// the report. Only an unavailable store returns `Err`; the run log is
    /// closed with an error outcome on a best-effort basis first.
    pub fn index(
        &self,
        scope: &RepoScope,
        files: &[SourceFile],
        cancel: &CancellationFlag,
    ) -> Result<IndexReport, PersistenceError> {
        let started = Instant::now();
        let execution_id = generate_execution_id();
        self.store
            .start_run(scope, &execution_id, crate::version::package_version())?;

        let mut report = IndexReport {
            execution_id: execution_id.clone(),
            scope: Some(scope.clone()),
            files_seen: files.len(),
            ..Default::default()
        };
        tracing::info!(%scope, execution_id, files = files.len(), "index job started");

        match self.run_phases(scope, files, cancel, &mut report) {
            Ok(()) => {
                report.elapsed_ms = started.elapsed().as_millis() as u64;
                self.store
                    .finish_run(&execution_id, report.outcome(), None, &report.counters())?;
                tracing::info!(
                    %scope,
                    indexed = report.files_indexed,
                    skipped = report.files_skipped,
                    linked = report.functions_linked,
                    unresolved = report.unresolved_calls,
                    cancelled = report.cancelled,
                    elapsed_ms = report.elapsed_ms,
                    "index job finished"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(%scope, code = e.code(), error = %e, "index job aborted");
                let _ = self.store.finish_run(
                    &execution_id,
                    RunOutcome::Error,
                    Some(&e.to_string()),
                    &report.counters(),
                );
                Err(e)
            }
        }
    }

    fn run_phases(
        &self,
        scope: &RepoScope,
        files: &[SourceFile],
        cancel: &CancellationFlag,
        report: &mut IndexReport,
    ) -> Result<(), PersistenceError> {
        // Phase 1
        let results = self.extract_all(files, cancel);

        let mut accumulator = GraphAccumulator::new();
        let mut sources: Vec<(String, String)> = Vec::new();
        for (file, result) in files.iter().zip(results) {
            match result {
                Some(Ok(extraction)) => {
                    sources.push((
                        file.path.clone(),
                        String::from_utf8_lossy(&file.bytes).into_owned(),
                    ));
                    accumulator.add_extraction(extraction);
                    report.files_indexed += 1;
                }
                Some(Err(e)) => {
                    tracing::warn!(path = %file.path, code = e.code(), error = %e, "skipping file");
                    report.files_skipped += 1;
                    report.skipped.push(SkippedFile {
                        path: file.path.clone(),
                        code: e.code().to_string(),
                        message: e.to_string(),
                    });
                }
                // Not reached before cancellation; picked up by the next run
                None => report.cancelled = true,
            }
        }

        // Phase 2
        let stats = if self.config.resolve_unlinked {
            let texts: HashMap<String, String> = sources.iter().cloned().collect();
            let snapshot = accumulator.snapshot(texts);
            let min_confidence = self.config.min_link_confidence;
            let fallback = |call: &PendingCall, name: &str| -> Option<FallbackTarget> {
                let result = self.resolver.resolve(
                    &snapshot,
                    name,
                    &call.path,
                    call.site.line,
                    Some(call.language),
                );
                let definition = result.definition?;
                if result.confidence < min_confidence {
                    return None;
                }
                Some(FallbackTarget {
                    id: definition.id,
                    confidence: result.confidence,
                    method: result.method.as_str().to_string(),
                })
            };
            accumulator.link_calls(self.config.link_batch_size, cancel, Some(&fallback))
        } else {
            accumulator.link_calls(self.config.link_batch_size, cancel, None)
        };
        report.functions_linked = stats.linked + stats.resolved_by_fallback;
        report.resolved_by_fallback = stats.resolved_by_fallback;
        report.unresolved_calls = stats.unresolved;
        report.cancelled |= stats.cancelled;
        report.summary = accumulator.summary(self.config.top_imports);

        // Persist
        let (nodes, edges) = accumulator.into_parts();
        let batch_size = self.config.batch_size.max(1);

        let mut outcome = BatchOutcome::default();
        for chunk in sources.chunks(batch_size) {
            let written = self.store.store_file_sources(scope, chunk);
            Self::check_fatal(&written)?;
            outcome.merge(written);
        }
        let mut nodes_outcome = BatchOutcome::default();
        for chunk in nodes.chunks(batch_size) {
            let written = self.store.upsert_nodes(scope, chunk);
            Self::check_fatal(&written)?;
            nodes_outcome.merge(written);
        }
        let mut edges_outcome = BatchOutcome::default();
        for chunk in edges.chunks(batch_size) {
            let written = self.store.upsert_edges(scope, chunk);
            Self::check_fatal(&written)?;
            edges_outcome.merge(written);
        }

        report.nodes_written = nodes_outcome.written();
        report.edges_written = edges_outcome.written();
        outcome.merge(nodes_outcome);
        outcome.merge(edges_outcome);
        report.persistence_errors = outcome.errors;
        Ok(())
    }

    /// Phase 1; `None` marks files not reached before cancellation
    fn extract_all(
        &self,
        files: &[SourceFile],
        cancel: &CancellationFlag,
    ) -> Vec<Option<Result<FileExtraction, ExtractionError>>> {
        let extract = |file: &SourceFile| {
            if cancel.is_cancelled() {
                return None;
            }
            Some(self.extract_one(file))
        };
        if self.config.parallel {
            files.par_iter().map(extract).collect()
        } else {
            files.iter().map(extract).collect()
        }
    }

    fn extract_one(&self, file: &SourceFile) -> Result<FileExtraction, ExtractionError> {
        if file.bytes.len() > self.config.max_file_bytes {
            return Err(ExtractionError::TooLarge {
                path: file.path.clone(),
                size: file.bytes.len(),
                limit: self.config.max_file_bytes,
            });
        }
        extract_file(&file.path, &file.bytes, file.language)
    }

    fn check_fatal(outcome: &BatchOutcome) -> Result<(), PersistenceError> {
        match outcome.errors.iter().find(|e| e.fatal) {
            Some(err) => Err(PersistenceError::Unavailable(err.message.clone())),
            None => Ok(()),
        }
    }
}

/// Collect every supported source file under `root`
///
/// Paths are made relative to `root` with `/` separators and returned in
/// sorted order. Files with no mapped extension are left out; unreadable
/// files are logged and left out.
pub fn discover_files(root: &Path, config: &IndexConfig) -> Result<Vec<SourceFile>> {
    let mut found: Vec<(PathBuf, Language)> = Vec::new();

    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && IGNORED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(language) = config.language_for(entry.path()) {
            found.push((entry.into_path(), language));
        }
    }
    found.sort();

    let mut files = Vec::with_capacity(found.len());
    for (path, language) in found {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match std::fs::read(&path) {
            Ok(bytes) => files.push(SourceFile::new(key, bytes, language)),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "unreadable file"),
        }
    }
    tracing::debug!(root = %root.display(), files = files.len(), "discovered source files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
        assert!(flag.as_arc().load(Ordering::SeqCst));
    }

    #[test]
    fn test_discover_skips_ignored_dirs_and_unknown_extensions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/b.ts"), "export function b() {}").unwrap();
        fs::write(root.join("src/a.py"), "def a():\n    pass\n").unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "function x() {}").unwrap();
        fs::write(root.join(".git/hook.py"), "").unwrap();

        let files = discover_files(root, &IndexConfig::default()).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.py", "src/b.ts"]);
        assert_eq!(files[0].language, Language::Python);
    }

    #[test]
    fn test_too_large_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = GraphStore::open(dir.path().join("graph.db")).unwrap();
        let config = IndexConfig {
            max_file_bytes: 8,
            ..IndexConfig::default()
        };
        let indexer = Indexer::new(&store, config);
        let files = vec![
            SourceFile::new("big.py", "def big():\n    pass\n", Language::Python),
            SourceFile::new("ok.py", "x = 1\n", Language::Python),
        ];

        let report = indexer
            .index(&RepoScope::new("t", "r"), &files, &CancellationFlag::new())
            .unwrap();
        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.skipped[0].code, crate::error_codes::MER_EXT_004_FILE_TOO_LARGE);
    }

    #[test]
    fn test_run_is_logged() {
        let dir = TempDir::new().unwrap();
        let store = GraphStore::open(dir.path().join("graph.db")).unwrap();
        let scope = RepoScope::new("t", "r");
        let indexer = Indexer::new(&store, IndexConfig::default());
        let files = vec![SourceFile::new("a.js", "function a() { b(); }\n", Language::JavaScript)];

        let report = indexer.index(&scope, &files, &CancellationFlag::new()).unwrap();
        let run = store.last_run(&scope).unwrap().unwrap();
        assert_eq!(run.execution_id, report.execution_id);
        assert_eq!(run.outcome, RunOutcome::Success);
        assert_eq!(run.counters.files_indexed, 1);
        assert_eq!(report.unresolved_calls, 1);
    }
}
