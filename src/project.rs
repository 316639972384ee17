use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{load_config, should_include_file, IndexConfig, INCGRAPH_DIR};
use crate::errors::{CodeGraphError, Result};
use crate::extraction::{ParseOutcome, ParserRegistry};
use crate::graph::CodeGraph;
use crate::sync::{self, content_hash, ChangeEvent, ChangeKind};
use crate::types::{normalize_path, ParsedFile};

/// Owns a project's configuration, parser registry and the shared graph.
///
/// Updates read and parse outside the graph lock and apply their
/// remove-then-add under a single write lock, so readers never see half an
/// update. A full re-index builds a fresh graph and swaps it in; per-file
/// updates that started before the swap are discarded.
pub struct ProjectIndex {
    root: PathBuf,
    config: IndexConfig,
    registry: ParserRegistry,
    graph: Arc<RwLock<CodeGraph>>,
    /// Bumped on every wholesale graph replacement.
    generation: AtomicU64,
    /// Last parse failure per path, cleared when the path indexes cleanly.
    failures: Mutex<BTreeMap<String, String>>,
}

/// Result of a full indexing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResult {
    /// Number of source files discovered.
    pub file_count: usize,
    /// Files that made it into the graph.
    pub indexed_count: usize,
    /// Files without an adapter or unreadable.
    pub skipped_count: usize,
    /// Files whose parse failed.
    pub failed_count: usize,
    pub symbol_count: usize,
    pub dependency_count: usize,
    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// Result of an incremental sync operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// Number of newly added files.
    pub files_added: usize,
    /// Number of modified (re-indexed) files.
    pub files_modified: usize,
    /// Number of removed files.
    pub files_removed: usize,
    /// New or modified files that failed to parse.
    pub files_failed: usize,
    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// What a single change event did to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The file was (re)parsed and its contribution replaced.
    Indexed { path: String, symbol_count: usize },
    /// The file's contribution was removed (or it had none).
    Removed { path: String },
    /// Content hash matches what the graph already holds.
    Unchanged { path: String },
    /// Not a source file: excluded by config, too large, no adapter, or
    /// outside the project root.
    Skipped { path: String },
    /// The adapter failed; any previous contribution was removed.
    Failed { path: String, message: String },
    /// A full re-index replaced the graph while this update was in flight.
    Superseded { path: String },
}

impl ProjectIndex {
    /// Opens a project at `root` with its stored (or default) configuration
    /// and the built-in parsers. The graph starts empty.
    pub fn open(root: &Path) -> Result<Self> {
        let config = load_config(root)?;
        Ok(Self::with_registry(root, config, ParserRegistry::with_defaults()))
    }

    pub fn with_registry(root: &Path, config: IndexConfig, registry: ParserRegistry) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            registry,
            graph: Arc::new(RwLock::new(CodeGraph::new())),
            generation: AtomicU64::new(0),
            failures: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Read access to the current graph. Hold the guard briefly; writers
    /// wait for it.
    pub fn graph(&self) -> RwLockReadGuard<'_, CodeGraph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current graph, unaffected by later updates.
    pub fn snapshot(&self) -> CodeGraph {
        self.graph().clone()
    }

    /// Shared handle to the graph for readers on other threads.
    pub fn shared_graph(&self) -> Arc<RwLock<CodeGraph>> {
        Arc::clone(&self.graph)
    }

    /// Paths whose last parse failed, with the failure text.
    pub fn failures(&self) -> BTreeMap<String, String> {
        self.lock_failures().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn write_graph(&self) -> RwLockWriteGuard<'_, CodeGraph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_failures(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Full indexing
// ---------------------------------------------------------------------------

impl ProjectIndex {
    /// Re-ingests the whole project into a new graph and swaps it in.
    ///
    /// A file that cannot be read or parsed is left out and the rest of the
    /// project still indexes; only a failure to walk the root is an error.
    pub fn index_all(&self) -> Result<IndexResult> {
        let start = Instant::now();
        let files = self.scan_files()?;

        let mut graph = CodeGraph::new();
        let mut failures = BTreeMap::new();
        let mut skipped = 0;

        for rel_path in &files {
            let source = match std::fs::read_to_string(self.root.join(rel_path)) {
                Ok(s) => s,
                Err(e) => {
                    warn!(path = %rel_path, error = %e, "failed to read file, skipping");
                    skipped += 1;
                    continue;
                }
            };

            match self.registry.parse_file(&source, rel_path) {
                ParseOutcome::Parsed(parsed) => graph.add_file(parsed),
                ParseOutcome::NoAdapter { .. } => skipped += 1,
                ParseOutcome::Failed { path, message } => {
                    warn!(%path, %message, "parse failed, file excluded from graph");
                    failures.insert(path, message);
                }
            }
        }

        let result = IndexResult {
            file_count: files.len(),
            indexed_count: graph.file_count(),
            skipped_count: skipped,
            failed_count: failures.len(),
            symbol_count: graph.symbol_count(),
            dependency_count: graph.dependency_count(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        {
            let mut current = self.write_graph();
            self.generation.fetch_add(1, Ordering::SeqCst);
            *current = graph;
        }
        *self.lock_failures() = failures;

        info!(
            files = result.file_count,
            indexed = result.indexed_count,
            failed = result.failed_count,
            symbols = result.symbol_count,
            duration_ms = result.duration_ms,
            "indexed project"
        );
        Ok(result)
    }

    /// Brings the graph in line with the files on disk, re-parsing only
    /// files that are new or whose content hash changed.
    pub fn sync(&self) -> Result<SyncResult> {
        let start = Instant::now();
        let generation = self.generation();
        let current_files = self.scan_files()?;

        let mut sources: HashMap<String, String> = HashMap::new();
        let mut current_hashes = Vec::new();
        for path in &current_files {
            if let Ok(source) = std::fs::read_to_string(self.root.join(path)) {
                current_hashes.push((path.clone(), content_hash(&source)));
                sources.insert(path.clone(), source);
            }
        }
        let readable: Vec<String> = current_hashes.iter().map(|(p, _)| p.clone()).collect();

        let (stale, new, removed) = {
            let graph = self.graph();
            (
                sync::find_stale_files(&graph, &current_hashes),
                sync::find_new_files(&graph, &readable),
                sync::find_removed_files(&graph, &current_files),
            )
        };

        let mut files_failed = 0;
        let mut updates: Vec<(String, Option<ParsedFile>)> = Vec::new();
        for path in &removed {
            updates.push((path.clone(), None));
        }
        for path in stale.iter().chain(new.iter()) {
            let Some(source) = sources.get(path) else {
                continue;
            };
            match self.registry.parse_file(source, path) {
                ParseOutcome::Parsed(parsed) => {
                    self.lock_failures().remove(path);
                    updates.push((path.clone(), Some(parsed)));
                }
                ParseOutcome::NoAdapter { .. } => updates.push((path.clone(), None)),
                ParseOutcome::Failed { path, message } => {
                    files_failed += 1;
                    self.lock_failures().insert(path.clone(), message);
                    updates.push((path, None));
                }
            }
        }

        // Failures only describe files that are still on disk.
        let on_disk: HashSet<&str> = current_files.iter().map(String::as_str).collect();
        self.lock_failures()
            .retain(|path, _| on_disk.contains(path.as_str()));

        {
            let mut graph = self.write_graph();
            if self.generation() != generation {
                debug!("sync superseded by a full re-index");
            } else {
                for (path, parsed) in updates {
                    graph.remove_file(&path);
                    if let Some(parsed) = parsed {
                        graph.add_file(parsed);
                    }
                }
            }
        }

        let result = SyncResult {
            files_added: new.len(),
            files_modified: stale.len(),
            files_removed: removed.len(),
            files_failed,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            added = result.files_added,
            modified = result.files_modified,
            removed = result.files_removed,
            failed = result.files_failed,
            "sync complete"
        );
        Ok(result)
    }

    /// Scans the project root for source files, respecting the configured
    /// include/exclude patterns and max file size. Paths are relative and
    /// use `/` separators.
    pub fn scan_files(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(CodeGraphError::File {
                message: "project root is not a directory".to_string(),
                path: self.root.display().to_string(),
            });
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Skip hidden directories and dependency folders.
                let name = e.file_name().to_string_lossy();
                e.depth() == 0 || !(name.starts_with('.') || name == "node_modules")
            });
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let rel_path = normalize_path(&rel.to_string_lossy());
            if !should_include_file(&rel_path, &self.config) {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if metadata.len() <= self.config.max_file_size {
                    files.push(rel_path);
                }
            }
        }
        Ok(files)
    }
}

// ---------------------------------------------------------------------------
// Incremental updates
// ---------------------------------------------------------------------------

impl ProjectIndex {
    /// Applies one change event: created/modified files are re-read and
    /// re-parsed, deleted files are removed.
    ///
    /// A path that vanished before it could be read is treated as deleted.
    /// Other read errors are returned.
    pub fn apply_event(&self, event: &ChangeEvent) -> Result<UpdateOutcome> {
        let generation = self.generation();
        let Some(path) = self.relative_path(&event.path) else {
            debug!(path = %event.path.display(), "event outside project root");
            return Ok(UpdateOutcome::Skipped {
                path: event.path.display().to_string(),
            });
        };

        if event.kind == ChangeKind::Deleted {
            return Ok(self.commit_removal(generation, path, true));
        }

        if !should_include_file(&path, &self.config) {
            return Ok(self.skip(generation, path));
        }

        let abs_path = self.root.join(&path);
        let source = match std::fs::read_to_string(&abs_path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(self.commit_removal(generation, path, false));
            }
            Err(e) => {
                return Err(CodeGraphError::File {
                    message: format!("failed to read file: {e}"),
                    path,
                })
            }
        };

        if source.len() as u64 > self.config.max_file_size {
            return Ok(self.skip(generation, path));
        }

        let unchanged = self
            .graph()
            .file(&path)
            .is_some_and(|record| record.content_hash == content_hash(&source));
        if unchanged {
            return Ok(UpdateOutcome::Unchanged { path });
        }

        match self.registry.parse_file(&source, &path) {
            ParseOutcome::Parsed(parsed) => {
                let symbol_count = parsed.symbols.len();
                if !self.commit(generation, &path, Some(parsed)) {
                    return Ok(UpdateOutcome::Superseded { path });
                }
                self.lock_failures().remove(&path);
                debug!(%path, symbol_count, "indexed file");
                Ok(UpdateOutcome::Indexed { path, symbol_count })
            }
            ParseOutcome::NoAdapter { .. } => Ok(self.skip(generation, path)),
            ParseOutcome::Failed { message, .. } => {
                warn!(%path, %message, "parse failed, file excluded from graph");
                if !self.commit(generation, &path, None) {
                    return Ok(UpdateOutcome::Superseded { path });
                }
                self.lock_failures().insert(path.clone(), message.clone());
                Ok(UpdateOutcome::Failed { path, message })
            }
        }
    }

    /// Removes `path` and, for a deleted directory, every file below it.
    fn commit_removal(
        &self,
        generation: u64,
        path: String,
        include_children: bool,
    ) -> UpdateOutcome {
        let mut graph = self.write_graph();
        if self.generation() != generation {
            return UpdateOutcome::Superseded { path };
        }
        if graph.remove_file(&path).is_none() && include_children {
            let prefix = format!("{path}/");
            let nested: Vec<String> = graph
                .files()
                .filter(|f| f.path.starts_with(&prefix))
                .map(|f| f.path.clone())
                .collect();
            for file in nested {
                graph.remove_file(&file);
            }
        }
        drop(graph);
        self.lock_failures().remove(&path);
        UpdateOutcome::Removed { path }
    }

    /// A path that is not (or no longer) a source file loses its contribution.
    fn skip(&self, generation: u64, path: String) -> UpdateOutcome {
        if !self.commit(generation, &path, None) {
            return UpdateOutcome::Superseded { path };
        }
        self.lock_failures().remove(&path);
        UpdateOutcome::Skipped { path }
    }

    /// Replaces `path`'s contribution in one critical section. Returns
    /// `false`, changing nothing, if the graph was replaced since
    /// `generation` was read.
    fn commit(&self, generation: u64, path: &str, parsed: Option<ParsedFile>) -> bool {
        let mut graph = self.write_graph();
        if self.generation() != generation {
            debug!(path, "discarding update from an older generation");
            return false;
        }
        graph.remove_file(path);
        if let Some(parsed) = parsed {
            graph.add_file(parsed);
        }
        true
    }

    /// Converts an absolute or root-relative path into the graph's key form.
    /// `None` for paths outside the root or inside the settings directory.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let rel = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => {
                    let canonical_root = self.root.canonicalize().ok()?;
                    path.strip_prefix(&canonical_root).ok()?.to_path_buf()
                }
            }
        } else {
            path.to_path_buf()
        };

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() || parts[0] == INCGRAPH_DIR {
            return None;
        }
        Some(normalize_path(&parts.join("/")))
    }
}
