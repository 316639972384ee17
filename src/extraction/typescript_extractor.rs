/// Tree-sitter based adapter for TypeScript, TSX and JavaScript.
///
/// Produces the full named-node syntax tree, module-scope symbols and the
/// file's import/require dependency edges.
use tree_sitter::{Language, Node as TsNode, Parser, Tree};

use super::ParserAdapter;
use crate::errors::{CodeGraphError, Result};
use crate::types::{
    syntax_node_id, Dependency, DependencyKind, ExportInfo, ImportInfo, Metadata, MetadataValue,
    ParsedFile, SourceSpan, Symbol, SymbolKind, SyntaxNode,
};

/// Leaf nodes longer than this do not get their text copied into metadata.
const MAX_LEAF_TEXT: usize = 120;

/// Source dialects handled by [`TypeScriptAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
    JavaScript,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::TypeScript => "typescript",
            Dialect::Tsx => "tsx",
            Dialect::JavaScript => "javascript",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Dialect::TypeScript => &["ts", "mts", "cts"],
            Dialect::Tsx => &["tsx"],
            Dialect::JavaScript => &["js", "jsx", "mjs", "cjs"],
        }
    }

    fn language(&self) -> Language {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// Parser adapter for one of the ECMAScript-family dialects.
pub struct TypeScriptAdapter {
    dialect: Dialect,
}

impl TypeScriptAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parse source code into a tree-sitter AST.
    fn parse_source(&self, source: &str, path: &str) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.dialect.language())
            .map_err(|e| CodeGraphError::Parse {
                message: format!("failed to load {} grammar: {e}", self.dialect.name()),
                path: path.to_string(),
                line: None,
            })?;
        parser.parse(source, None).ok_or_else(|| CodeGraphError::Parse {
            message: "tree-sitter parse returned None".to_string(),
            path: path.to_string(),
            line: None,
        })
    }
}

impl ParserAdapter for TypeScriptAdapter {
    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn extensions(&self) -> &[&str] {
        self.dialect.extensions()
    }

    fn parse(&self, content: &str, path: &str) -> Result<ParsedFile> {
        let tree = self.parse_source(content, path)?;
        let root = tree.root_node();

        if root.has_error() {
            let line = first_error_line(root);
            return Err(CodeGraphError::Parse {
                message: format!("syntax error in {} source", self.dialect.name()),
                path: path.to_string(),
                line,
            });
        }

        let mut state = ExtractionState::new(path, content);
        let mut syntax_tree = state
            .build_syntax_tree(root)
            .ok_or_else(|| CodeGraphError::Parse {
                message: "empty syntax tree".to_string(),
                path: path.to_string(),
                line: None,
            })?;
        syntax_tree
            .metadata
            .insert("language".to_string(), self.dialect.name().into());
        syntax_tree.metadata.insert(
            "line_count".to_string(),
            MetadataValue::Int(content.lines().count() as i64),
        );

        state.visit_program(root);
        state.collect_module_calls(root);
        state.dependencies.sort_by_key(|d| {
            d.span
                .as_ref()
                .map(|s| (s.start_line, s.start_column))
                .unwrap_or_default()
        });

        Ok(ParsedFile {
            path: path.to_string(),
            language: self.dialect.name().to_string(),
            content_hash: String::new(),
            syntax_tree,
            symbols: state.symbols,
            dependencies: state.dependencies,
        })
    }
}

/// Internal state used during AST traversal.
struct ExtractionState<'s> {
    file_path: String,
    source: &'s [u8],
    symbols: Vec<Symbol>,
    dependencies: Vec<Dependency>,
}

impl<'s> ExtractionState<'s> {
    fn new(file_path: &str, source: &'s str) -> Self {
        Self {
            file_path: file_path.to_string(),
            source: source.as_bytes(),
            symbols: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Gets the text of a tree-sitter node from the source.
    fn text(&self, node: TsNode<'_>) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn span(&self, node: TsNode<'_>) -> SourceSpan {
        let start = node.start_position();
        let end = node.end_position();
        SourceSpan {
            file_path: self.file_path.clone(),
            start_line: start.row as u32 + 1,
            start_column: start.column as u32,
            end_line: end.row as u32 + 1,
            end_column: end.column as u32,
        }
    }

    /// Text of a string literal node without its quotes.
    fn string_value(&self, node: TsNode<'_>) -> String {
        self.text(node)
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .to_string()
    }

    // ------------------------------------------------------------------
    // Syntax tree
    // ------------------------------------------------------------------

    /// Converts a tree-sitter node and its named descendants, numbering
    /// nodes in pre-order.
    ///
    /// Walks with an explicit stack; expression chains nest as deep as the
    /// file is long.
    fn build_syntax_tree(&self, root: TsNode<'_>) -> Option<SyntaxNode> {
        let mut flat: Vec<(SyntaxNode, Option<usize>)> = Vec::new();
        let mut stack = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            let ordinal = flat.len();
            flat.push((self.syntax_node(node, ordinal), parent));
            let mut cursor = node.walk();
            let children: Vec<TsNode<'_>> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev().map(|c| (c, Some(ordinal))));
        }

        // Every node sits after its parent, so popping from the back
        // finishes each subtree before its parent is attached.
        let mut tree = None;
        while let Some((mut node, parent)) = flat.pop() {
            node.children.reverse();
            match parent {
                Some(index) => flat[index].0.children.push(node),
                None => tree = Some(node),
            }
        }
        tree
    }

    /// One syntax node without its children.
    fn syntax_node(&self, node: TsNode<'_>, ordinal: usize) -> SyntaxNode {
        let name = node.child_by_field_name("name").map(|n| self.text(n));
        let mut metadata = Metadata::new();
        if node.named_child_count() == 0 {
            let text = self.text(node);
            if !text.is_empty() && text.len() <= MAX_LEAF_TEXT {
                metadata.insert("text".to_string(), MetadataValue::Str(text));
            }
        }

        SyntaxNode {
            id: syntax_node_id(&self.file_path, ordinal),
            kind: node.kind().to_string(),
            name,
            span: self.span(node),
            children: Vec::new(),
            metadata,
        }
    }

    // ------------------------------------------------------------------
    // Module-scope statements
    // ------------------------------------------------------------------

    fn visit_program(&mut self, root: TsNode<'_>) {
        let mut cursor = root.walk();
        let statements: Vec<TsNode<'_>> = root.named_children(&mut cursor).collect();
        for stmt in statements {
            match stmt.kind() {
                "import_statement" => self.visit_import(stmt),
                "export_statement" => self.visit_export(stmt),
                _ => {
                    self.visit_declaration(stmt, None);
                }
            }
        }
    }

    /// Records the symbols declared by `node`. `export` carries the
    /// is-default flag when the declaration sits under `export`.
    fn visit_declaration(&mut self, node: TsNode<'_>, export: Option<bool>) -> bool {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "function_signature" => {
                let mut metadata = Metadata::new();
                metadata.insert("async".to_string(), has_child_kind(node, "async").into());
                if node.kind() == "generator_function_declaration" {
                    metadata.insert("generator".to_string(), true.into());
                }
                self.push_named(node, SymbolKind::Function, export, metadata)
            }
            "class_declaration" | "abstract_class_declaration" => {
                let mut metadata = Metadata::new();
                if node.kind() == "abstract_class_declaration" {
                    metadata.insert("abstract".to_string(), true.into());
                }
                self.push_named(node, SymbolKind::Class, export, metadata)
            }
            "interface_declaration" => {
                self.push_named(node, SymbolKind::Interface, export, Metadata::new())
            }
            "type_alias_declaration" => {
                self.push_named(node, SymbolKind::TypeAlias, export, Metadata::new())
            }
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variables(node, export);
                true
            }
            "ambient_declaration" => {
                let mut cursor = node.walk();
                let inner: Vec<TsNode<'_>> = node.named_children(&mut cursor).collect();
                let mut handled = false;
                for child in inner {
                    handled |= self.visit_declaration(child, export);
                }
                handled
            }
            _ => false,
        }
    }

    fn visit_variables(&mut self, node: TsNode<'_>, export: Option<bool>) {
        let declaration = if node.kind() == "variable_declaration" {
            "var".to_string()
        } else {
            node.child_by_field_name("kind")
                .map(|k| self.text(k))
                .unwrap_or_else(|| "let".to_string())
        };

        let mut cursor = node.walk();
        let declarators: Vec<TsNode<'_>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        for declarator in declarators {
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            // Destructuring patterns are not tracked as symbols.
            if name_node.kind() != "identifier" {
                continue;
            }
            let name = self.text(name_node);
            let mut symbol = Symbol::new(&name, SymbolKind::Variable, self.span(declarator));
            symbol.metadata.insert(
                "declaration".to_string(),
                MetadataValue::Str(declaration.clone()),
            );
            symbol.export_info = export.map(|is_default| ExportInfo {
                is_default,
                exported_name: name.clone(),
                alias: None,
            });
            self.symbols.push(symbol);
        }
    }

    /// Pushes a symbol named by the node's `name` field.
    fn push_named(
        &mut self,
        node: TsNode<'_>,
        kind: SymbolKind,
        export: Option<bool>,
        metadata: Metadata,
    ) -> bool {
        let Some(name_node) = node.child_by_field_name("name") else {
            return false;
        };
        let name = self.text(name_node);
        let mut symbol = Symbol::new(&name, kind, self.span(node));
        symbol.metadata = metadata;
        symbol.export_info = export.map(|is_default| ExportInfo {
            is_default,
            exported_name: name.clone(),
            alias: None,
        });
        self.symbols.push(symbol);
        true
    }

    fn visit_import(&mut self, node: TsNode<'_>) {
        let span = self.span(node);
        let mut cursor = node.walk();
        let children: Vec<TsNode<'_>> = node.named_children(&mut cursor).collect();

        // `import fs = require("fs")`
        if let Some(clause) = children.iter().find(|c| c.kind() == "import_require_clause") {
            let Some(source_node) = clause.child_by_field_name("source") else {
                return;
            };
            let source = self.string_value(source_node);
            let mut inner = clause.walk();
            let local = clause
                .named_children(&mut inner)
                .find(|c| c.kind() == "identifier")
                .map(|c| self.text(c));
            if let Some(local) = local {
                self.push_import(&local, &source, false, "*", Some(&local), &span);
            }
            self.dependencies.push(Dependency {
                from: self.file_path.clone(),
                to: source,
                kind: DependencyKind::Require,
                specifiers: vec!["*".to_string()],
                span: Some(span),
            });
            return;
        }

        let Some(source_node) = node.child_by_field_name("source") else {
            return;
        };
        let source = self.string_value(source_node);
        let mut specifiers = Vec::new();

        if let Some(clause) = children.iter().find(|c| c.kind() == "import_clause") {
            let mut clause_cursor = clause.walk();
            let parts: Vec<TsNode<'_>> = clause.named_children(&mut clause_cursor).collect();
            for part in parts {
                match part.kind() {
                    "identifier" => {
                        let local = self.text(part);
                        self.push_import(&local, &source, true, "default", Some(&local), &span);
                        specifiers.push("default".to_string());
                    }
                    "namespace_import" => {
                        let mut ns_cursor = part.walk();
                        let local = part
                            .named_children(&mut ns_cursor)
                            .find(|c| c.kind() == "identifier")
                            .map(|c| self.text(c));
                        if let Some(local) = local {
                            self.push_import(&local, &source, false, "*", Some(&local), &span);
                        }
                        specifiers.push("*".to_string());
                    }
                    "named_imports" => {
                        let mut named_cursor = part.walk();
                        let specs: Vec<TsNode<'_>> = part
                            .named_children(&mut named_cursor)
                            .filter(|c| c.kind() == "import_specifier")
                            .collect();
                        for spec in specs {
                            let Some(name_node) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let imported = self.string_value(name_node);
                            let alias = spec.child_by_field_name("alias").map(|a| self.text(a));
                            let local = alias.clone().unwrap_or_else(|| imported.clone());
                            self.push_import(
                                &local,
                                &source,
                                false,
                                &imported,
                                alias.as_deref(),
                                &span,
                            );
                            specifiers.push(imported);
                        }
                    }
                    _ => {}
                }
            }
        }

        self.dependencies.push(Dependency {
            from: self.file_path.clone(),
            to: source,
            kind: DependencyKind::Import,
            specifiers,
            span: Some(span),
        });
    }

    fn push_import(
        &mut self,
        local: &str,
        source: &str,
        is_default: bool,
        imported_name: &str,
        imported_as: Option<&str>,
        span: &SourceSpan,
    ) {
        let mut symbol = Symbol::new(local, SymbolKind::Import, span.clone());
        symbol.import_info = Some(ImportInfo {
            source: source.to_string(),
            is_default,
            imported_name: imported_name.to_string(),
            imported_as: imported_as.map(str::to_string),
        });
        self.symbols.push(symbol);
    }

    fn visit_export(&mut self, node: TsNode<'_>) {
        let is_default = has_child_kind(node, "default");

        if let Some(declaration) = node.child_by_field_name("declaration") {
            self.visit_declaration(declaration, Some(is_default));
            return;
        }

        let span = self.span(node);
        let source = node
            .child_by_field_name("source")
            .map(|s| self.string_value(s));

        // `export default <expression>`
        if let Some(value) = node.child_by_field_name("value") {
            // Some grammar versions parse `export default function f() {}`
            // as a named function expression.
            let named_kind = match value.kind() {
                "function_expression" | "function" | "generator_function" => {
                    Some(SymbolKind::Function)
                }
                "class" => Some(SymbolKind::Class),
                _ => None,
            };
            if let Some(kind) = named_kind {
                if value.child_by_field_name("name").is_some() {
                    let mut metadata = Metadata::new();
                    if kind == SymbolKind::Function {
                        metadata.insert("async".to_string(), has_child_kind(value, "async").into());
                    }
                    self.push_named(value, kind, Some(true), metadata);
                    return;
                }
            }

            let exported_name = if value.kind() == "identifier" {
                self.text(value)
            } else {
                "default".to_string()
            };
            let mut symbol = Symbol::new("default", SymbolKind::Export, span);
            symbol.export_info = Some(ExportInfo {
                is_default: true,
                exported_name,
                alias: None,
            });
            symbol
                .metadata
                .insert("expression".to_string(), value.kind().into());
            self.symbols.push(symbol);
            return;
        }

        let mut specifiers = Vec::new();
        let mut cursor = node.walk();
        let children: Vec<TsNode<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "export_clause" => {
                    let mut clause_cursor = child.walk();
                    let specs: Vec<TsNode<'_>> = child
                        .named_children(&mut clause_cursor)
                        .filter(|c| c.kind() == "export_specifier")
                        .collect();
                    for spec in specs {
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let local = self.string_value(name_node);
                        let alias = spec
                            .child_by_field_name("alias")
                            .map(|a| self.string_value(a));
                        let public = alias.clone().unwrap_or_else(|| local.clone());
                        let mut symbol =
                            Symbol::new(&public, SymbolKind::Export, self.span(spec));
                        symbol.export_info = Some(ExportInfo {
                            is_default: public == "default",
                            exported_name: local.clone(),
                            alias,
                        });
                        if let Some(source) = &source {
                            symbol
                                .metadata
                                .insert("source".to_string(), source.as_str().into());
                        }
                        self.symbols.push(symbol);
                        specifiers.push(local);
                    }
                }
                "namespace_export" => {
                    let mut ns_cursor = child.walk();
                    let name = child
                        .named_children(&mut ns_cursor)
                        .next()
                        .map(|c| self.string_value(c));
                    if let Some(name) = name {
                        let mut symbol = Symbol::new(&name, SymbolKind::Export, self.span(child));
                        symbol.export_info = Some(ExportInfo {
                            is_default: false,
                            exported_name: "*".to_string(),
                            alias: Some(name.clone()),
                        });
                        if let Some(source) = &source {
                            symbol
                                .metadata
                                .insert("source".to_string(), source.as_str().into());
                        }
                        self.symbols.push(symbol);
                    }
                    specifiers.push("*".to_string());
                }
                _ => {}
            }
        }

        if let Some(source) = source {
            // `export * from "x"` has neither clause nor namespace node.
            if specifiers.is_empty() && has_child_kind(node, "*") {
                specifiers.push("*".to_string());
            }
            self.dependencies.push(Dependency {
                from: self.file_path.clone(),
                to: source,
                kind: DependencyKind::Import,
                specifiers,
                span: Some(span),
            });
        }
    }

    // ------------------------------------------------------------------
    // require() / import() anywhere in the file
    // ------------------------------------------------------------------

    fn collect_module_calls(&mut self, root: TsNode<'_>) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "call_expression" {
                self.visit_call(node);
            }
            let mut cursor = node.walk();
            let children: Vec<TsNode<'_>> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }

    fn visit_call(&mut self, node: TsNode<'_>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let kind = match function.kind() {
            "import" => DependencyKind::DynamicImport,
            "identifier" if self.text(function) == "require" => DependencyKind::Require,
            _ => return,
        };
        let Some(arguments) = node.child_by_field_name("arguments") else {
            return;
        };
        let mut cursor = arguments.walk();
        let first = arguments.named_children(&mut cursor).next();
        let Some(first) = first else {
            return;
        };
        // Computed specifiers cannot be followed.
        if first.kind() != "string" {
            return;
        }
        let target = self.string_value(first);
        self.dependencies.push(Dependency {
            from: self.file_path.clone(),
            to: target,
            kind,
            specifiers: Vec::new(),
            span: Some(self.span(node)),
        });
    }
}

fn has_child_kind(node: TsNode<'_>, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

/// 1-based line of the first ERROR or MISSING node, in pre-order.
fn first_error_line(root: TsNode<'_>) -> Option<u32> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row as u32 + 1);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<TsNode<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}
