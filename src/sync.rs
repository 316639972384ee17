use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::graph::CodeGraph;

/// Compute SHA-256 content hash of file content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Kind of filesystem change reported by the change source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A discrete change to one file. `path` may be absolute or relative to the
/// project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Created,
            path: path.into(),
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Modified,
            path: path.into(),
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            path: path.into(),
        }
    }
}

/// Find files whose stored content hash differs from the current hash.
pub fn find_stale_files(graph: &CodeGraph, current_hashes: &[(String, String)]) -> Vec<String> {
    current_hashes
        .iter()
        .filter(|(path, hash)| {
            graph
                .file(path)
                .is_some_and(|record| record.content_hash != *hash)
        })
        .map(|(path, _)| path.clone())
        .collect()
}

/// Find files that exist on disk but not in the graph.
pub fn find_new_files(graph: &CodeGraph, current_files: &[String]) -> Vec<String> {
    current_files
        .iter()
        .filter(|path| !graph.contains_file(path))
        .cloned()
        .collect()
}

/// Find files that are in the graph but no longer exist on disk.
pub fn find_removed_files(graph: &CodeGraph, current_files: &[String]) -> Vec<String> {
    let current_set: HashSet<&str> = current_files.iter().map(|s| s.as_str()).collect();
    graph
        .files()
        .filter(|record| !current_set.contains(record.path.as_str()))
        .map(|record| record.path.clone())
        .collect()
}
