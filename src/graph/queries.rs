use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::CodeGraph;
use crate::resolution::resolve_module;
use crate::types::*;

/// A symbol name paired with where it is declared, for compact listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub line: u32,
}

impl From<&Symbol> for SymbolRef {
    fn from(s: &Symbol) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            kind: s.kind,
            line: s.span.start_line,
        }
    }
}

/// Read-only projections over a [`CodeGraph`].
///
/// Every query is a pure function of the graph's current state.
pub struct GraphQueryManager<'a> {
    graph: &'a CodeGraph,
}

impl<'a> GraphQueryManager<'a> {
    pub fn new(graph: &'a CodeGraph) -> Self {
        Self { graph }
    }

    /// All symbols of the given kind.
    pub fn symbols_by_type(&self, kind: SymbolKind) -> Vec<&'a Symbol> {
        self.graph.symbols().filter(|s| s.kind == kind).collect()
    }

    /// All symbols whose name equals `name` exactly, across files.
    pub fn symbols_by_name(&self, name: &str) -> Vec<&'a Symbol> {
        self.graph
            .symbol_ids_named(name)
            .filter_map(|id| self.graph.symbol(id))
            .collect()
    }

    /// Symbols declared in `path`, in declaration order.
    pub fn symbols_in_file(&self, path: &str) -> Vec<&'a Symbol> {
        self.graph.file_symbols(path)
    }

    /// Adjacency from file path to the specifiers it depends on, in edge
    /// insertion order.
    pub fn dependency_graph(&self) -> BTreeMap<String, Vec<String>> {
        let mut graph: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for dep in self.graph.dependencies() {
            graph.entry(dep.from.clone()).or_default().push(dep.to.clone());
        }
        graph
    }

    /// Dependency edges declared by `path`.
    pub fn dependencies_of(&self, path: &str) -> Vec<&'a Dependency> {
        self.graph
            .dependencies()
            .iter()
            .filter(|d| d.from == path)
            .collect()
    }

    /// Exported symbols grouped by declaring file. Files without exports are
    /// omitted.
    pub fn exported_symbols_by_file(&self) -> BTreeMap<String, Vec<&'a Symbol>> {
        self.group_by_file(Symbol::is_exported)
    }

    /// Import symbols grouped by declaring file. Files without imports are
    /// omitted.
    pub fn imported_symbols_by_file(&self) -> BTreeMap<String, Vec<&'a Symbol>> {
        self.group_by_file(Symbol::is_import)
    }

    /// Exported symbols of one file.
    pub fn exported_symbols(&self, path: &str) -> Vec<&'a Symbol> {
        self.symbols_in_file(path)
            .into_iter()
            .filter(|s| s.is_exported())
            .collect()
    }

    /// Import symbols of one file.
    pub fn imported_symbols(&self, path: &str) -> Vec<&'a Symbol> {
        self.symbols_in_file(path)
            .into_iter()
            .filter(|s| s.is_import())
            .collect()
    }

    /// Every reference held by symbols named `name`.
    pub fn references_of(&self, name: &str) -> Vec<&'a SymbolReference> {
        self.symbols_by_name(name)
            .into_iter()
            .flat_map(|s| s.references.iter())
            .collect()
    }

    /// Counts of nodes, symbols (total and per kind), files and dependency edges.
    pub fn summary(&self) -> GraphSummary {
        let mut symbols_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for symbol in self.graph.symbols() {
            *symbols_by_kind
                .entry(symbol.kind.as_str().to_string())
                .or_default() += 1;
        }
        GraphSummary {
            total_nodes: self.graph.node_count(),
            total_symbols: self.graph.symbol_count(),
            total_files: self.graph.file_count(),
            symbols_by_kind,
            total_dependencies: self.graph.dependency_count(),
        }
    }

    /// Adjacency from file path to the project files its relative imports
    /// resolve to. Unresolvable and package specifiers are left out; each
    /// target appears once per source file.
    pub fn resolved_dependency_graph(&self) -> BTreeMap<String, Vec<String>> {
        let mut graph: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for dep in self.graph.dependencies() {
            let targets = graph.entry(dep.from.clone()).or_default();
            if let Some(target) = self.resolve(dep) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        graph
    }

    /// Resolves one dependency edge to a file in the graph.
    pub fn resolve(&self, dep: &Dependency) -> Option<String> {
        resolve_module(&dep.from, &dep.to, |p| self.graph.contains_file(p))
    }

    /// Files whose resolved imports point at `path`.
    pub fn dependents_of(&self, path: &str) -> Vec<String> {
        let dependents: BTreeSet<String> = self
            .graph
            .dependencies()
            .iter()
            .filter(|d| self.resolve(d).as_deref() == Some(path))
            .map(|d| d.from.clone())
            .collect();
        dependents.into_iter().collect()
    }

    /// Syntax nodes of `path` in pre-order, starting at the file's root.
    pub fn syntax_nodes(&self, path: &str) -> Vec<&'a GraphNode> {
        self.graph
            .file(path)
            .map(|record| {
                record
                    .node_ids
                    .iter()
                    .filter_map(|id| self.graph.node(path, id))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn group_by_file(&self, keep: impl Fn(&Symbol) -> bool) -> BTreeMap<String, Vec<&'a Symbol>> {
        let mut grouped: BTreeMap<String, Vec<&'a Symbol>> = BTreeMap::new();
        for record in self.graph.files() {
            let symbols: Vec<&'a Symbol> = record
                .symbol_ids
                .iter()
                .filter_map(|id| self.graph.symbol(id))
                .filter(|s| keep(s))
                .collect();
            if !symbols.is_empty() {
                grouped.insert(record.path.clone(), symbols);
            }
        }
        grouped
    }
}
