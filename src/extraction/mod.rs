/// Parser adapters and the registry that dispatches to them.
///
/// An adapter turns source text into a syntax tree, a symbol list and a
/// dependency list. The registry picks the adapter for a path and contains
/// any fault the adapter raises, so callers always get a `ParseOutcome`.
mod typescript_extractor;

pub use typescript_extractor::{Dialect, TypeScriptAdapter};

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::errors::Result;
use crate::sync::content_hash;
use crate::types::{normalize_path, ParsedFile};

/// Trait for dialect-specific source parsers.
pub trait ParserAdapter: Send + Sync {
    /// Human-readable dialect name, also stored as the file's language tag.
    fn name(&self) -> &str;

    /// File extensions this adapter handles (lowercase, without leading dot).
    fn extensions(&self) -> &[&str];

    /// Capability predicate. The default accepts any advertised extension.
    fn can_parse(&self, _path: &str, extension: &str) -> bool {
        self.extensions().contains(&extension)
    }

    /// Parse `content` into a syntax tree, symbols and dependencies.
    ///
    /// `path` is the project-relative path used for ids and spans.
    fn parse(&self, content: &str, path: &str) -> Result<ParsedFile>;
}

/// Result of asking the registry to parse one file.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// The adapter succeeded.
    Parsed(ParsedFile),
    /// No registered adapter accepts this file.
    NoAdapter { path: String },
    /// The adapter reported an error or panicked.
    Failed { path: String, message: String },
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    pub fn path(&self) -> &str {
        match self {
            ParseOutcome::Parsed(file) => &file.path,
            ParseOutcome::NoAdapter { path } | ParseOutcome::Failed { path, .. } => path,
        }
    }

    /// The failure text, if this outcome is not a success.
    pub fn error_message(&self) -> Option<String> {
        match self {
            ParseOutcome::Parsed(_) => None,
            ParseOutcome::NoAdapter { path } => Some(format!("no parser registered for '{path}'")),
            ParseOutcome::Failed { message, .. } => Some(message.clone()),
        }
    }
}

/// Ordered set of parser adapters; the first registered match wins.
pub struct ParserRegistry {
    adapters: Vec<Box<dyn ParserAdapter>>,
}

impl ParserRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Creates a registry with the built-in TypeScript, TSX and JavaScript adapters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_parser(Box::new(TypeScriptAdapter::new(Dialect::TypeScript)));
        registry.register_parser(Box::new(TypeScriptAdapter::new(Dialect::Tsx)));
        registry.register_parser(Box::new(TypeScriptAdapter::new(Dialect::JavaScript)));
        registry
    }

    /// Appends an adapter. Earlier registrations take precedence.
    pub fn register_parser(&mut self, adapter: Box<dyn ParserAdapter>) {
        debug!(adapter = adapter.name(), "registered parser");
        self.adapters.push(adapter);
    }

    /// Returns the first adapter that accepts the path and extension.
    pub fn get_parser(&self, path: &str, extension: &str) -> Option<&dyn ParserAdapter> {
        self.adapters
            .iter()
            .find(|a| a.can_parse(path, extension))
            .map(|a| a.as_ref())
    }

    /// Parses `content` with the adapter selected for `path`.
    ///
    /// Never fails: a missing adapter, an adapter error, or an adapter panic
    /// are all reported through the returned outcome.
    pub fn parse_file(&self, content: &str, path: &str) -> ParseOutcome {
        let path = normalize_path(path);
        let extension = file_extension(&path);
        let Some(adapter) = self.get_parser(&path, &extension) else {
            debug!(%path, "no parser for file");
            return ParseOutcome::NoAdapter { path };
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| adapter.parse(content, &path)));
        match result {
            Ok(Ok(mut file)) => {
                file.content_hash = content_hash(content);
                ParseOutcome::Parsed(file)
            }
            Ok(Err(e)) => {
                debug!(%path, error = %e, "parser reported failure");
                ParseOutcome::Failed {
                    path,
                    message: e.to_string(),
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%path, adapter = adapter.name(), %message, "parser panicked");
                ParseOutcome::Failed {
                    path,
                    message: format!("parser '{}' panicked: {}", adapter.name(), message),
                }
            }
        }
    }

    /// Returns all supported file extensions across all adapters.
    pub fn supported_extensions(&self) -> Vec<&str> {
        self.adapters
            .iter()
            .flat_map(|a| a.extensions().iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Lowercased extension of the final path component, or `""` if none.
pub fn file_extension(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_of_final_component() {
        assert_eq!(file_extension("src/a.ts"), "ts");
        assert_eq!(file_extension("src/App.TSX"), "tsx");
        assert_eq!(file_extension("src.d/Makefile"), "");
        assert_eq!(file_extension(".eslintrc"), "");
        assert_eq!(file_extension("types/index.d.ts"), "ts");
    }
}
