use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Kinds of symbols extracted from a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Variable,
    Import,
    Export,
    Interface,
    TypeAlias,
}

#[allow(clippy::should_implement_trait)]
impl SymbolKind {
    /// Returns the string representation of this symbol kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Variable => "variable",
            SymbolKind::Import => "import",
            SymbolKind::Export => "export",
            SymbolKind::Interface => "interface",
            SymbolKind::TypeAlias => "type_alias",
        }
    }

    /// Parses a string into a `SymbolKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<SymbolKind> {
        match s {
            "function" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "variable" => Some(SymbolKind::Variable),
            "import" => Some(SymbolKind::Import),
            "export" => Some(SymbolKind::Export),
            "interface" => Some(SymbolKind::Interface),
            "type_alias" | "type" => Some(SymbolKind::TypeAlias),
            _ => None,
        }
    }

    /// All symbol kinds, in declaration order.
    pub fn all() -> [SymbolKind; 7] {
        [
            SymbolKind::Function,
            SymbolKind::Class,
            SymbolKind::Variable,
            SymbolKind::Import,
            SymbolKind::Export,
            SymbolKind::Interface,
            SymbolKind::TypeAlias,
        ]
    }
}

/// How a symbol is mentioned at a reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Definition,
    Usage,
    Call,
    Import,
    Export,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Definition => "definition",
            ReferenceKind::Usage => "usage",
            ReferenceKind::Call => "call",
            ReferenceKind::Import => "import",
            ReferenceKind::Export => "export",
        }
    }
}

/// Kinds of file-level dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// `import ... from "x"` and `export ... from "x"`.
    Import,
    /// `import("x")`.
    DynamicImport,
    /// `require("x")` and `import x = require("x")`.
    Require,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Import => "import",
            DependencyKind::DynamicImport => "dynamic_import",
            DependencyKind::Require => "require",
        }
    }
}

/// A location in a source file. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub file_path: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// Value stored in an open metadata map.
///
/// Adapters attach dialect-specific facts through these without widening
/// the shared schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Str(v)
    }
}

/// Ordered open-ended attribute map.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// One node of a per-file syntax tree, as produced by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub span: SourceSpan,
    pub children: Vec<SyntaxNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl SyntaxNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

impl Drop for SyntaxNode {
    // Deep trees would otherwise be dropped one stack frame per level.
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// A syntax node as stored in the graph: the tree is flattened, so children
/// are referenced by id and each node records its owning file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub file_path: String,
    pub span: SourceSpan,
    pub parent: Option<String>,
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

/// A located mention of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolReference {
    pub file_path: String,
    pub span: SourceSpan,
    pub kind: ReferenceKind,
}

/// Export details for a symbol that leaves its module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub is_default: bool,
    pub exported_name: String,
    pub alias: Option<String>,
}

/// Import details for a binding introduced by an import statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Module specifier exactly as written, e.g. `./a` or `react`.
    pub source: String,
    pub is_default: bool,
    /// Name in the exporting module; `default` or `*` for default and
    /// namespace imports.
    pub imported_name: String,
    /// Local binding name when it differs from `imported_name`.
    pub imported_as: Option<String>,
}

/// A named, typed program entity declared in one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub span: SourceSpan,
    /// Derived state, maintained by the graph.
    #[serde(default)]
    pub references: Vec<SymbolReference>,
    pub export_info: Option<ExportInfo>,
    pub import_info: Option<ImportInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Symbol {
    /// Creates a symbol with a deterministic id and no references.
    pub fn new(name: &str, kind: SymbolKind, span: SourceSpan) -> Self {
        Self {
            id: generate_symbol_id(&span.file_path, &kind, name, span.start_line),
            name: name.to_string(),
            kind,
            file_path: span.file_path.clone(),
            span,
            references: Vec::new(),
            export_info: None,
            import_info: None,
            metadata: Metadata::new(),
        }
    }

    pub fn is_exported(&self) -> bool {
        self.export_info.is_some() || self.kind == SymbolKind::Export
    }

    pub fn is_import(&self) -> bool {
        self.kind == SymbolKind::Import
    }

    /// The reference every symbol carries to its own declaration.
    pub fn definition_reference(&self) -> SymbolReference {
        SymbolReference {
            file_path: self.file_path.clone(),
            span: self.span.clone(),
            kind: ReferenceKind::Definition,
        }
    }
}

/// A directed, unresolved edge from a file to a module specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub from: String,
    pub to: String,
    pub kind: DependencyKind,
    pub specifiers: Vec<String>,
    pub span: Option<SourceSpan>,
}

/// Everything an adapter produced for one file; consumed by `CodeGraph::add_file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFile {
    pub path: String,
    pub language: String,
    pub content_hash: String,
    pub syntax_tree: SyntaxNode,
    pub symbols: Vec<Symbol>,
    pub dependencies: Vec<Dependency>,
}

/// Record tracking what one file contributed to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: String,
    pub content_hash: String,
    pub root_node_id: String,
    pub node_ids: Vec<String>,
    pub symbol_ids: Vec<String>,
    pub dependency_count: usize,
}

/// Aggregate counts describing the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub total_nodes: usize,
    pub total_symbols: usize,
    pub total_files: usize,
    pub symbols_by_kind: BTreeMap<String, usize>,
    pub total_dependencies: usize,
}

/// Generates a deterministic symbol ID from file path, kind, name, and line number.
///
/// The ID format is `"kind:32hexchars"` where the hex portion is the first 32
/// characters of the SHA-256 hash of the input components.
pub fn generate_symbol_id(file_path: &str, kind: &SymbolKind, name: &str, line: u32) -> String {
    let input = format!("{}:{}:{}:{}", file_path, kind.as_str(), name, line);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let hash = hasher.finalize();
    let hex_str = hex::encode(hash);
    format!("{}:{}", kind.as_str(), &hex_str[..32])
}

/// Id of the syntax node at `ordinal` in a pre-order walk of `file_path`'s tree.
pub fn syntax_node_id(file_path: &str, ordinal: usize) -> String {
    format!("{file_path}#{ordinal}")
}

/// Normalizes a path to the forward-slash form used as graph keys.
pub fn normalize_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    p.strip_prefix("./").map(str::to_string).unwrap_or(p)
}
