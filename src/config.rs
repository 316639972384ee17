use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::errors::{CodeGraphError, Result};

/// Name of the configuration file stored inside the `.incgraph` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store project settings.
pub const INCGRAPH_DIR: &str = ".incgraph";

/// Per-project indexing configuration.
///
/// Controls which files are considered source files and size limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Root directory of the project being indexed.
    pub root_dir: String,
    /// Glob patterns for files to include during indexing.
    pub include: Vec<String>,
    /// Glob patterns for files to exclude during indexing.
    pub exclude: Vec<String>,
    /// Maximum file size in bytes; files larger than this are skipped.
    pub max_file_size: u64,
    /// Whether the directory walk follows symbolic links.
    pub follow_links: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            version: 1,
            root_dir: String::new(),
            include: [
                "**/*.ts", "**/*.tsx", "**/*.mts", "**/*.cts", "**/*.js", "**/*.jsx", "**/*.mjs",
                "**/*.cjs",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude: [
                "node_modules/**",
                "**/node_modules/**",
                ".git/**",
                ".incgraph/**",
                "dist/**",
                "build/**",
                "coverage/**",
                "**/*.min.*",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_file_size: 1_048_576,
            follow_links: false,
        }
    }
}

/// Returns the path to the `.incgraph` directory within the given project root.
pub fn get_incgraph_dir(project_root: &Path) -> PathBuf {
    project_root.join(INCGRAPH_DIR)
}

/// Returns the path to the configuration file within the `.incgraph` directory.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_incgraph_dir(project_root).join(CONFIG_FILENAME)
}

/// Loads the configuration from disk.
///
/// If the configuration file does not exist, returns a default configuration
/// with `root_dir` set to the given project root.
pub fn load_config(project_root: &Path) -> Result<IndexConfig> {
    let config_path = get_config_path(project_root);

    if !config_path.exists() {
        return Ok(IndexConfig {
            root_dir: project_root.to_string_lossy().to_string(),
            ..IndexConfig::default()
        });
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| CodeGraphError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    serde_json::from_str(&contents).map_err(|e| CodeGraphError::Config {
        message: format!(
            "failed to parse config file '{}': {}",
            config_path.display(),
            e
        ),
    })
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it into place.
pub fn save_config(project_root: &Path, config: &IndexConfig) -> Result<()> {
    let dir = get_incgraph_dir(project_root);
    fs::create_dir_all(&dir).map_err(|e| CodeGraphError::Config {
        message: format!("failed to create directory '{}': {}", dir.display(), e),
    })?;

    let config_path = get_config_path(project_root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| CodeGraphError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| CodeGraphError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| CodeGraphError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}

/// Determines whether a file should be included based on the configuration's
/// include and exclude glob patterns.
///
/// A file is included only if it matches at least one include pattern and
/// does not match any exclude pattern. Exclude patterns take precedence.
pub fn should_include_file(file_path: &str, config: &IndexConfig) -> bool {
    let match_opts = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let matches = |pattern_str: &String| {
        Pattern::new(pattern_str)
            .map(|p| p.matches_with(file_path, match_opts))
            .unwrap_or(false)
    };

    if config.exclude.iter().any(matches) {
        return false;
    }
    config.include.iter().any(matches)
}
