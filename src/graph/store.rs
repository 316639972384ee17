use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::resolution::{is_relative_specifier, ReferenceResolver};
use crate::types::*;

/// The in-memory project graph.
///
/// Owns every syntax node, symbol, dependency edge and file record. All
/// mutation goes through [`CodeGraph::add_file`] and [`CodeGraph::remove_file`],
/// which keep each symbol's reference list equal to what
/// [`CodeGraph::rebuild_references`] would compute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeGraph {
    /// Syntax nodes per file, keyed by the adapter's id. Ids only need to
    /// be unique within their file.
    nodes: HashMap<String, HashMap<String, GraphNode>>,
    symbols: BTreeMap<String, Symbol>,
    dependencies: Vec<Dependency>,
    files: BTreeMap<String, FileRecord>,
    /// Symbol ids grouped by symbol name.
    symbols_by_name: HashMap<String, BTreeSet<String>>,
    /// Ids of import symbols with a relative specifier, keyed by both the
    /// imported name and the local alias.
    imports_by_name: HashMap<String, BTreeSet<String>>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Ingests one file's parse output.
    ///
    /// Callers replace a file by removing it first; a record still present
    /// for the same path is removed here with a warning.
    pub fn add_file(&mut self, parsed: ParsedFile) {
        let ParsedFile {
            path,
            language,
            content_hash,
            syntax_tree,
            symbols,
            dependencies,
        } = parsed;

        if self.files.contains_key(&path) {
            warn!(%path, "add_file called for a path already in the graph; replacing it");
            self.remove_file(&path);
        }

        let root_node_id = syntax_tree.id.clone();
        let node_ids = self.insert_tree(syntax_tree, &path);

        let mut symbol_ids = Vec::with_capacity(symbols.len());
        for mut symbol in symbols {
            if self.symbols.contains_key(&symbol.id) {
                debug!(%path, id = %symbol.id, "duplicate symbol id, keeping the first");
                continue;
            }
            symbol.file_path = path.clone();
            symbol.references.clear();
            self.index_symbol(&symbol);
            symbol_ids.push(symbol.id.clone());
            self.symbols.insert(symbol.id.clone(), symbol);
        }

        let dependency_count = dependencies.len();
        self.dependencies
            .extend(dependencies.into_iter().map(|dep| Dependency {
                from: path.clone(),
                ..dep
            }));

        debug!(
            %path,
            nodes = node_ids.len(),
            symbols = symbol_ids.len(),
            dependencies = dependency_count,
            "added file to graph"
        );

        self.files.insert(
            path.clone(),
            FileRecord {
                path: path.clone(),
                language,
                content_hash,
                root_node_id,
                node_ids,
                symbol_ids: symbol_ids.clone(),
                dependency_count,
            },
        );

        self.link_file(&path, &symbol_ids);
    }

    /// Removes everything `path` contributed. Returns the removed record, or
    /// `None` if the path was not in the graph.
    pub fn remove_file(&mut self, path: &str) -> Option<FileRecord> {
        let record = self.files.remove(path)?;

        let mut removed_imports = Vec::new();
        for id in &record.symbol_ids {
            if let Some(symbol) = self.symbols.remove(id) {
                self.unindex_symbol(&symbol);
                if symbol.kind == SymbolKind::Import {
                    removed_imports.push(symbol);
                }
            }
        }

        self.nodes.remove(path);

        let before = self.dependencies.len();
        self.dependencies.retain(|d| d.from != path);

        // Only this file's imports can have put references to it on other
        // files' symbols.
        for import in &removed_imports {
            for target_id in self.import_targets(import) {
                if let Some(target) = self.symbols.get_mut(&target_id) {
                    target.references.retain(|r| r.file_path != path);
                }
            }
        }

        debug!(
            path,
            symbols = record.symbol_ids.len(),
            dependencies = before - self.dependencies.len(),
            "removed file from graph"
        );
        Some(record)
    }

    /// Recomputes all reference lists from scratch.
    pub fn rebuild_references(&mut self) {
        ReferenceResolver::rebuild_all(&mut self.symbols);
    }

    /// Drops all contents.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn insert_tree(&mut self, root: SyntaxNode, file_path: &str) -> Vec<String> {
        let mut ids = Vec::with_capacity(root.subtree_size());
        let mut file_nodes: HashMap<String, GraphNode> = HashMap::with_capacity(ids.capacity());
        let mut stack = vec![(root, None::<String>)];

        while let Some((mut node, parent)) = stack.pop() {
            let id = std::mem::take(&mut node.id);
            let children = std::mem::take(&mut node.children);

            let child_ids = children.iter().map(|c| c.id.clone()).collect();
            for child in children.into_iter().rev() {
                stack.push((child, Some(id.clone())));
            }

            let graph_node = GraphNode {
                id: id.clone(),
                kind: std::mem::take(&mut node.kind),
                name: node.name.take(),
                file_path: file_path.to_string(),
                span: node.span.clone(),
                parent,
                children: child_ids,
                metadata: std::mem::take(&mut node.metadata),
            };
            if file_nodes.insert(id.clone(), graph_node).is_some() {
                warn!(%id, file_path, "duplicate syntax node id within file");
            } else {
                ids.push(id);
            }
        }

        self.nodes.insert(file_path.to_string(), file_nodes);
        ids
    }

    // ------------------------------------------------------------------
    // Incremental reference maintenance
    // ------------------------------------------------------------------

    fn index_symbol(&mut self, symbol: &Symbol) {
        self.symbols_by_name
            .entry(symbol.name.clone())
            .or_default()
            .insert(symbol.id.clone());
        for key in import_keys(symbol) {
            self.imports_by_name
                .entry(key)
                .or_default()
                .insert(symbol.id.clone());
        }
    }

    fn unindex_symbol(&mut self, symbol: &Symbol) {
        remove_from_index(&mut self.symbols_by_name, &symbol.name, &symbol.id);
        for key in import_keys(symbol) {
            remove_from_index(&mut self.imports_by_name, &key, &symbol.id);
        }
    }

    /// Ids of symbols in other files that `import` refers to.
    fn import_targets(&self, import: &Symbol) -> BTreeSet<String> {
        let mut targets = BTreeSet::new();
        for key in import_keys(import) {
            let Some(ids) = self.symbols_by_name.get(&key) else {
                continue;
            };
            for id in ids {
                if let Some(target) = self.symbols.get(id) {
                    if ReferenceResolver::refers_to(import, target) {
                        targets.insert(id.clone());
                    }
                }
            }
        }
        targets
    }

    /// Import references that other files' imports contribute to `symbol`.
    fn incoming_references(&self, symbol: &Symbol) -> Vec<SymbolReference> {
        let Some(ids) = self.imports_by_name.get(&symbol.name) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.symbols.get(id))
            .filter(|import| ReferenceResolver::refers_to(import, symbol))
            .map(ReferenceResolver::import_reference)
            .collect()
    }

    /// Brings references up to date after `path` was added with `symbol_ids`.
    fn link_file(&mut self, path: &str, symbol_ids: &[String]) {
        // The new file's own symbols: definition plus imports from files
        // already present.
        for id in symbol_ids {
            let Some(symbol) = self.symbols.get(id) else {
                continue;
            };
            let mut imported = self.incoming_references(symbol);
            ReferenceResolver::sort_references(&mut imported);
            let mut references = Vec::with_capacity(imported.len() + 1);
            references.push(symbol.definition_reference());
            references.extend(imported);
            if let Some(symbol) = self.symbols.get_mut(id) {
                symbol.references = references;
            }
        }

        // Existing symbols named by the new file's imports.
        let mut touched = 0usize;
        for id in symbol_ids {
            let Some(import) = self.symbols.get(id) else {
                continue;
            };
            if import.kind != SymbolKind::Import {
                continue;
            }
            let reference = ReferenceResolver::import_reference(import);
            for target_id in self.import_targets(import) {
                if let Some(target) = self.symbols.get_mut(&target_id) {
                    target.references.push(reference.clone());
                    ReferenceResolver::sort_references(&mut target.references[1..]);
                    touched += 1;
                }
            }
        }
        if touched > 0 {
            debug!(path, touched, "linked import references");
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// The syntax node `id` of file `path`.
    pub fn node(&self, path: &str, id: &str) -> Option<&GraphNode> {
        self.nodes.get(path)?.get(id)
    }

    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// All symbols, ordered by id.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().flat_map(|file_nodes| file_nodes.values())
    }

    /// All files, ordered by path.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// All dependency edges in insertion order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Symbols declared in `path`, in declaration order.
    pub fn file_symbols(&self, path: &str) -> Vec<&Symbol> {
        self.files
            .get(path)
            .map(|record| {
                record
                    .symbol_ids
                    .iter()
                    .filter_map(|id| self.symbols.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of symbols with the given name.
    pub fn symbol_ids_named(&self, name: &str) -> impl Iterator<Item = &String> {
        self.symbols_by_name.get(name).into_iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.values().map(HashMap::len).sum()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Names under which an import symbol is indexed; empty for non-imports and
/// package imports, which never match.
fn import_keys(symbol: &Symbol) -> Vec<String> {
    let Some(info) = &symbol.import_info else {
        return Vec::new();
    };
    if symbol.kind != SymbolKind::Import || !is_relative_specifier(&info.source) {
        return Vec::new();
    }
    let mut keys = vec![info.imported_name.clone()];
    if let Some(alias) = &info.imported_as {
        if alias != &info.imported_name {
            keys.push(alias.clone());
        }
    }
    keys
}

fn remove_from_index(index: &mut HashMap<String, BTreeSet<String>>, key: &str, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}
