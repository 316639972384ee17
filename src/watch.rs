//! Filesystem change source and the single-consumer update queue.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::errors::{CodeGraphError, Result};
use crate::project::{ProjectIndex, UpdateOutcome};
use crate::sync::{ChangeEvent, ChangeKind};

/// Watches a project root recursively and reports file changes as
/// [`ChangeEvent`]s.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<ChangeEvent>,
    root: PathBuf,
}

impl ChangeWatcher {
    /// Starts watching `root`. Events begin flowing immediately.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watch_root = root.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for change in translate_event(&watch_root, &event) {
                        debug!(kind = ?change.kind, path = %change.path.display(), "file change");
                        if event_tx.send(change).is_err() {
                            warn!("change receiver dropped, discarding event");
                        }
                    }
                }
                Err(e) => error!(error = %e, "file system watch error"),
            })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "watching for changes");

        Ok(Self {
            _watcher: watcher,
            event_rx,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Waits for the next change. `None` once the watcher has shut down.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.event_rx.recv().await
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<ChangeEvent> {
        &mut self.event_rx
    }
}

/// Maps one notify event to zero or more change events.
///
/// Renames report each involved path as modified if it still exists and
/// deleted otherwise. A directory that appears, by creation or by being
/// renamed into place, is reported as one creation per file below it.
/// Metadata-only changes and access events are dropped.
pub fn translate_event(root: &Path, event: &notify::Event) -> Vec<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => None,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => return Vec::new(),
    };

    let mut changes = Vec::new();
    for path in &event.paths {
        if should_ignore_path(root, path) {
            continue;
        }
        let kind = kind.unwrap_or(if path.exists() {
            ChangeKind::Modified
        } else {
            ChangeKind::Deleted
        });
        if kind != ChangeKind::Deleted && path.is_dir() {
            changes.extend(files_below(root, path).into_iter().map(ChangeEvent::created));
            continue;
        }
        changes.push(ChangeEvent {
            kind,
            path: path.clone(),
        });
    }
    changes
}

/// Files under `dir`, skipping ignored directories, in walk order.
fn files_below(root: &Path, dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !should_ignore_path(root, entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "failed to walk new directory");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// True for paths inside hidden directories or `node_modules` below `root`.
pub fn should_ignore_path(root: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || part == "node_modules"
        }
        _ => false,
    })
}

/// Serializes change events onto a [`ProjectIndex`].
///
/// A single task drains the channel, so events for the same path are applied
/// in the order they were pushed and never interleave. Parsing runs on the
/// blocking pool.
pub struct UpdateQueue {
    sender: mpsc::UnboundedSender<ChangeEvent>,
    handle: JoinHandle<usize>,
}

impl UpdateQueue {
    /// Spawns the consumer task on the current tokio runtime.
    pub fn spawn(index: Arc<ProjectIndex>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ChangeEvent>();

        let handle = tokio::spawn(async move {
            let mut applied = 0usize;
            while let Some(event) = receiver.recv().await {
                let index = Arc::clone(&index);
                let result =
                    tokio::task::spawn_blocking(move || index.apply_event(&event)).await;
                match result {
                    Ok(Ok(outcome)) => {
                        log_outcome(&outcome);
                        applied += 1;
                    }
                    Ok(Err(e)) => warn!(error = %e, "failed to apply change"),
                    Err(e) => error!(error = %e, "update task panicked"),
                }
            }
            debug!(applied, "update queue drained");
            applied
        });

        Self { sender, handle }
    }

    /// A cloneable handle for pushing events from other tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<ChangeEvent> {
        self.sender.clone()
    }

    pub fn push(&self, event: ChangeEvent) -> Result<()> {
        self.sender.send(event).map_err(|_| CodeGraphError::Watch {
            message: "update queue is closed".to_string(),
        })
    }

    /// Closes this handle's sender and waits for queued events to be applied.
    /// Returns how many events were applied. Clones from [`Self::sender`]
    /// keep the queue open until they are dropped.
    pub async fn shutdown(self) -> usize {
        drop(self.sender);
        match self.handle.await {
            Ok(applied) => applied,
            Err(e) => {
                error!(error = %e, "update queue task failed");
                0
            }
        }
    }
}

fn log_outcome(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::Indexed { path, symbol_count } => {
            info!(%path, symbol_count, "re-indexed file")
        }
        UpdateOutcome::Removed { path } => info!(%path, "removed file"),
        UpdateOutcome::Failed { path, message } => warn!(%path, %message, "parse failed"),
        UpdateOutcome::Superseded { path } => debug!(%path, "update superseded by re-index"),
        UpdateOutcome::Unchanged { path } | UpdateOutcome::Skipped { path } => {
            debug!(%path, ?outcome, "no graph change")
        }
    }
}
