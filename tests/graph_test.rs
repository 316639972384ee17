use incgraph::errors::Result;
use incgraph::extraction::{ParseOutcome, ParserAdapter, ParserRegistry};
use incgraph::graph::{CodeGraph, GraphQueryManager};
use incgraph::types::*;

fn parsed(path: &str, source: &str) -> ParsedFile {
    match ParserRegistry::with_defaults().parse_file(source, path) {
        ParseOutcome::Parsed(file) => file,
        other => panic!("expected {path} to parse, got {:?}", other.error_message()),
    }
}

fn build(files: &[(&str, &str)]) -> CodeGraph {
    let mut graph = CodeGraph::new();
    for (path, source) in files {
        graph.add_file(parsed(path, source));
    }
    graph
}

fn function<'a>(graph: &'a CodeGraph, name: &str) -> Option<&'a Symbol> {
    GraphQueryManager::new(graph)
        .symbols_by_name(name)
        .into_iter()
        .find(|s| s.kind == SymbolKind::Function)
}

/// Every symbol with its references, ordered by id.
fn symbol_state(graph: &CodeGraph) -> Vec<Symbol> {
    graph.symbols().cloned().collect()
}

/// Asserts the incrementally maintained references match a full rebuild.
fn assert_matches_rebuild(graph: &CodeGraph) {
    let mut rebuilt = graph.clone();
    rebuilt.rebuild_references();
    assert_eq!(symbol_state(graph), symbol_state(&rebuilt));
}

const A_TS: &str = "export function add(x, y) { return x + y }\n";
const B_TS: &str = "import { add } from './a'\n";

// ---------------------------------------------------------------------------
// End-to-end
// ---------------------------------------------------------------------------

#[test]
fn test_import_links_definition_and_reference() {
    let graph = build(&[("a.ts", A_TS), ("b.ts", B_TS)]);
    let queries = GraphQueryManager::new(&graph);

    let add = function(&graph, "add").expect("function add");
    assert_eq!(add.file_path, "a.ts");
    assert_eq!(add.references.len(), 2);
    assert_eq!(add.references[0].kind, ReferenceKind::Definition);
    assert_eq!(add.references[0].file_path, "a.ts");
    assert_eq!(add.references[1].kind, ReferenceKind::Import);
    assert_eq!(add.references[1].file_path, "b.ts");
    assert_eq!(add.references[1].span.start_line, 1);

    let deps = queries.dependency_graph();
    assert_eq!(deps.get("b.ts"), Some(&vec!["./a".to_string()]));
    assert!(!deps.contains_key("a.ts"));

    let summary = queries.summary();
    assert!(summary.total_symbols >= 2);
    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.total_dependencies, 1);
}

#[test]
fn test_remove_definition_file() {
    let mut graph = build(&[("a.ts", A_TS), ("b.ts", B_TS)]);
    let record = graph.remove_file("a.ts").expect("a.ts was indexed");
    assert_eq!(record.path, "a.ts");

    assert!(function(&graph, "add").is_none());
    assert!(!graph.contains_file("a.ts"));
    assert!(graph.nodes().all(|n| n.file_path != "a.ts"));

    let import = GraphQueryManager::new(&graph)
        .symbols_by_name("add")
        .into_iter()
        .find(|s| s.kind == SymbolKind::Import)
        .expect("import symbol survives");
    assert_eq!(import.file_path, "b.ts");
    assert_eq!(import.references.len(), 1);
    assert_eq!(import.references[0].kind, ReferenceKind::Definition);
    assert_matches_rebuild(&graph);
}

#[test]
fn test_remove_importing_file_drops_reference() {
    let mut graph = build(&[("a.ts", A_TS), ("b.ts", B_TS)]);
    graph.remove_file("b.ts");

    let add = function(&graph, "add").unwrap();
    assert_eq!(add.references.len(), 1);
    assert!(GraphQueryManager::new(&graph).dependency_graph().is_empty());
    assert_matches_rebuild(&graph);
}

#[test]
fn test_remove_absent_path_is_noop() {
    let mut graph = build(&[("a.ts", A_TS)]);
    let before = graph.clone();
    assert!(graph.remove_file("missing.ts").is_none());
    assert_eq!(graph, before);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn test_reingestion_is_idempotent() {
    let mut graph = build(&[("a.ts", A_TS), ("b.ts", B_TS)]);
    let symbols = symbol_state(&graph);
    let files: Vec<FileRecord> = graph.files().cloned().collect();
    let deps = GraphQueryManager::new(&graph).dependency_graph();
    let nodes = graph.node_count();

    for path in ["a.ts", "b.ts"] {
        let source = if path == "a.ts" { A_TS } else { B_TS };
        graph.remove_file(path);
        graph.add_file(parsed(path, source));
    }

    assert_eq!(symbol_state(&graph), symbols);
    assert_eq!(graph.files().cloned().collect::<Vec<_>>(), files);
    assert_eq!(GraphQueryManager::new(&graph).dependency_graph(), deps);
    assert_eq!(graph.node_count(), nodes);
}

#[test]
fn test_add_existing_path_replaces_record() {
    let mut graph = build(&[("a.ts", A_TS)]);
    graph.add_file(parsed("a.ts", "export function sub(x, y) { return x - y }\n"));

    assert_eq!(graph.file_count(), 1);
    assert!(function(&graph, "add").is_none());
    assert!(function(&graph, "sub").is_some());
}

#[test]
fn test_references_complete_in_either_order() {
    let forward = build(&[("a.ts", A_TS), ("b.ts", B_TS)]);
    let backward = build(&[("b.ts", B_TS), ("a.ts", A_TS)]);
    assert_eq!(symbol_state(&forward), symbol_state(&backward));
    assert_eq!(function(&backward, "add").unwrap().references.len(), 2);
}

#[test]
fn test_no_dangling_references_after_removal() {
    let mut graph = build(&[
        ("src/a.ts", A_TS),
        ("src/b.ts", "import { add } from './a'\nexport const two = add(1, 1)\n"),
        ("src/c.ts", "import { add } from './a'\nimport { two } from './b'\n"),
    ]);
    assert_eq!(function(&graph, "add").unwrap().references.len(), 3);

    graph.remove_file("src/b.ts");
    for symbol in graph.symbols() {
        for reference in &symbol.references {
            assert!(
                graph.contains_file(&reference.file_path),
                "{} holds a reference into removed {}",
                symbol.name,
                reference.file_path
            );
        }
    }
    assert_eq!(function(&graph, "add").unwrap().references.len(), 2);
    assert_matches_rebuild(&graph);
}

#[test]
fn test_self_reference_excluded() {
    let graph = build(&[("a.ts", "import { x } from './a'\nexport const x = 1\n")]);
    let x = GraphQueryManager::new(&graph)
        .symbols_by_name("x")
        .into_iter()
        .find(|s| s.kind == SymbolKind::Variable)
        .unwrap();
    assert_eq!(x.references.len(), 1);
    assert_eq!(x.references[0].kind, ReferenceKind::Definition);
}

#[test]
fn test_alias_import_references_original() {
    let graph = build(&[
        ("lib/math.ts", A_TS),
        ("app.ts", "import { add as plus } from './lib/math'\n"),
    ]);
    let add = function(&graph, "add").unwrap();
    assert_eq!(add.references.len(), 2);
    assert_eq!(add.references[1].file_path, "app.ts");
}

#[test]
fn test_package_imports_never_match() {
    let graph = build(&[("a.ts", A_TS), ("b.ts", "import { add } from 'a'\n")]);
    assert_eq!(function(&graph, "add").unwrap().references.len(), 1);
}

#[test]
fn test_textual_match_ignores_specifier_extension() {
    let graph = build(&[
        ("src/util.ts", "export function helper() {}\n"),
        ("src/main.ts", "import { helper } from './util.js'\n"),
    ]);
    assert_eq!(function(&graph, "helper").unwrap().references.len(), 2);
}

#[test]
fn test_import_references_sorted_by_location() {
    let graph = build(&[
        ("a.ts", A_TS),
        ("z.ts", "import { add } from './a'\n"),
        ("m.ts", "\n\nimport { add } from './a'\n"),
        ("c.ts", "import { add } from './a'\n"),
    ]);
    let add = function(&graph, "add").unwrap();
    let files: Vec<&str> = add.references.iter().map(|r| r.file_path.as_str()).collect();
    assert_eq!(files, vec!["a.ts", "c.ts", "m.ts", "z.ts"]);
    assert_eq!(add.references[2].span.start_line, 3);
}

#[test]
fn test_incremental_matches_rebuild_over_sequence() {
    let sources = [
        ("src/a.ts", A_TS),
        ("src/b.ts", "import { add } from './a'\nexport function twice(x) { return add(x, x) }\n"),
        ("src/c.ts", "import { twice } from './b'\nimport { add as plus } from './a'\nexport class C {}\n"),
        ("src/d.ts", "import { C } from './c'\nimport * as a from './a'\nexport default C\n"),
        ("src/e.js", "const { twice } = require('./b')\nexport const add = 3\n"),
    ];
    let mut graph = CodeGraph::new();
    for (path, source) in sources {
        graph.add_file(parsed(path, source));
        assert_matches_rebuild(&graph);
    }

    graph.remove_file("src/a.ts");
    assert_matches_rebuild(&graph);
    graph.add_file(parsed("src/a.ts", "export function add(a, b) { return a + b }\nexport function twice() {}\n"));
    assert_matches_rebuild(&graph);
    graph.remove_file("src/c.ts");
    assert_matches_rebuild(&graph);
    graph.remove_file("src/b.ts");
    graph.add_file(parsed("src/b.ts", "export const unrelated = 1\n"));
    assert_matches_rebuild(&graph);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn test_dependency_adjacency_preserves_order() {
    let graph = build(&[(
        "main.ts",
        "import { c } from './c'\nimport { a } from './a'\nimport { b } from './b'\n",
    )]);
    let deps = GraphQueryManager::new(&graph).dependency_graph();
    assert_eq!(deps["main.ts"], vec!["./c", "./a", "./b"]);
}

#[test]
fn test_symbols_by_type_and_name() {
    let graph = build(&[
        ("a.ts", "export function run() {}\nexport class Job {}\n"),
        ("b.ts", "export function run() {}\ninterface Opts {}\n"),
    ]);
    let queries = GraphQueryManager::new(&graph);

    assert_eq!(queries.symbols_by_type(SymbolKind::Function).len(), 2);
    assert_eq!(queries.symbols_by_type(SymbolKind::Class).len(), 1);
    assert_eq!(queries.symbols_by_type(SymbolKind::Interface).len(), 1);

    let runs = queries.symbols_by_name("run");
    assert_eq!(runs.len(), 2);
    let mut files: Vec<&str> = runs.iter().map(|s| s.file_path.as_str()).collect();
    files.sort();
    assert_eq!(files, vec!["a.ts", "b.ts"]);
    assert!(queries.symbols_by_name("missing").is_empty());

    let names: Vec<&str> = queries
        .symbols_in_file("a.ts")
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(names, vec!["run", "Job"]);
}

#[test]
fn test_exported_and_imported_by_file() {
    let graph = build(&[
        ("a.ts", "export function add() {}\nfunction hidden() {}\n"),
        ("b.ts", "import { add } from './a'\nimport React from 'react'\n"),
        ("c.ts", "const local = 1\n"),
    ]);
    let queries = GraphQueryManager::new(&graph);

    let exported = queries.exported_symbols_by_file();
    assert_eq!(exported.len(), 1);
    let names: Vec<&str> = exported["a.ts"].iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["add"]);

    let imported = queries.imported_symbols_by_file();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported["b.ts"].len(), 2);
    assert!(queries.imported_symbols("a.ts").is_empty());
    assert_eq!(queries.exported_symbols("a.ts").len(), 1);
}

#[test]
fn test_summary_counts_by_kind() {
    let graph = build(&[("a.ts", A_TS), ("b.ts", B_TS)]);
    let summary = GraphQueryManager::new(&graph).summary();
    assert_eq!(summary.symbols_by_kind.get("function"), Some(&1));
    assert_eq!(summary.symbols_by_kind.get("import"), Some(&1));
    assert_eq!(summary.total_nodes, graph.node_count());
    assert!(summary.total_nodes > 2);

    let empty = GraphQueryManager::new(&CodeGraph::new()).summary();
    assert_eq!(empty.total_symbols, 0);
    assert!(empty.symbols_by_kind.is_empty());
}

#[test]
fn test_references_of_collects_all_symbols() {
    let graph = build(&[("a.ts", A_TS), ("b.ts", B_TS)]);
    let refs = GraphQueryManager::new(&graph).references_of("add");
    // Function: definition + import; import symbol: its own definition.
    assert_eq!(refs.len(), 3);
}

#[test]
fn test_references_of_lists_locations() {
    let graph = build(&[("a.ts", A_TS), ("b.ts", B_TS)]);
    let refs = GraphQueryManager::new(&graph).references_of("add");
    let json = serde_json::to_value(&refs).unwrap();
    let entries = json.as_array().unwrap();

    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.get("span").is_some()));
    assert!(entries
        .iter()
        .any(|e| e["file_path"] == "b.ts" && e["kind"] == "import"));
    assert!(entries.iter().all(|e| e.get("references").is_none()));
}

#[test]
fn test_syntax_nodes_are_linked() {
    let graph = build(&[("a.ts", A_TS)]);
    let queries = GraphQueryManager::new(&graph);
    let nodes = queries.syntax_nodes("a.ts");
    let record = graph.file("a.ts").unwrap();

    assert_eq!(nodes.len(), record.node_ids.len());
    assert_eq!(nodes[0].id, record.root_node_id);
    assert_eq!(nodes[0].kind, "program");
    assert!(nodes[0].parent.is_none());
    for node in &nodes[1..] {
        let parent = graph.node("a.ts", node.parent.as_ref().unwrap()).unwrap();
        assert!(parent.children.contains(&node.id));
    }
    assert!(nodes
        .iter()
        .any(|n| n.kind == "function_declaration" && n.name.as_deref() == Some("add")));
}

/// Adapter whose node ids are the same in every file it parses.
struct FixedIdAdapter;

impl ParserAdapter for FixedIdAdapter {
    fn name(&self) -> &str {
        "fixed"
    }

    fn extensions(&self) -> &[&str] {
        &["loc"]
    }

    fn parse(&self, _content: &str, path: &str) -> Result<ParsedFile> {
        let span = SourceSpan {
            file_path: path.to_string(),
            start_line: 1,
            start_column: 0,
            end_line: 1,
            end_column: 0,
        };
        let leaf = SyntaxNode {
            id: "leaf".to_string(),
            kind: "leaf".to_string(),
            name: None,
            span: span.clone(),
            children: Vec::new(),
            metadata: Metadata::new(),
        };
        Ok(ParsedFile {
            path: path.to_string(),
            language: "fixed".to_string(),
            content_hash: String::new(),
            syntax_tree: SyntaxNode {
                id: "root".to_string(),
                kind: "program".to_string(),
                name: None,
                span,
                children: vec![leaf],
                metadata: Metadata::new(),
            },
            symbols: Vec::new(),
            dependencies: Vec::new(),
        })
    }
}

#[test]
fn test_node_ids_are_scoped_to_their_file() {
    let mut registry = ParserRegistry::new();
    registry.register_parser(Box::new(FixedIdAdapter));
    let mut graph = CodeGraph::new();
    for path in ["a.loc", "b.loc"] {
        match registry.parse_file("", path) {
            ParseOutcome::Parsed(file) => graph.add_file(file),
            other => panic!("expected {path} to parse, got {:?}", other.error_message()),
        }
    }
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.node("b.loc", "leaf").unwrap().file_path, "b.loc");

    graph.remove_file("b.loc");

    assert_eq!(graph.node_count(), 2);
    let queries = GraphQueryManager::new(&graph);
    let nodes = queries.syntax_nodes("a.loc");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].id, "root");
    assert_eq!(nodes[1].parent.as_deref(), Some("root"));
    assert_eq!(graph.node("a.loc", "root").unwrap().file_path, "a.loc");
    assert!(graph.node("b.loc", "root").is_none());
}

#[test]
fn test_resolved_dependency_graph() {
    let graph = build(&[
        ("src/a.ts", A_TS),
        ("src/lib/index.ts", "export const version = 1\n"),
        (
            "src/main.ts",
            "import { add } from './a'\nimport { version } from './lib'\nimport fs from 'fs'\nimport { x } from './missing'\n",
        ),
    ]);
    let queries = GraphQueryManager::new(&graph);
    let resolved = queries.resolved_dependency_graph();
    assert_eq!(
        resolved["src/main.ts"],
        vec!["src/a.ts".to_string(), "src/lib/index.ts".to_string()]
    );
    assert_eq!(queries.dependents_of("src/a.ts"), vec!["src/main.ts"]);
    assert!(queries.dependents_of("src/main.ts").is_empty());
}
