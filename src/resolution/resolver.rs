use std::collections::BTreeMap;

use crate::types::*;

/// Source extensions stripped from specifiers and file paths before matching.
/// `.d.ts` must come before `.ts`.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    ".d.ts", ".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs",
];

/// Matches import symbols to the declarations they import.
///
/// Matching is textual: an import of `name` from a relative specifier refers
/// to every symbol called `name` in another file whose path contains the
/// specifier's module stem. Package imports (`react`, `@scope/pkg`) and path
/// aliases never match.
pub struct ReferenceResolver;

impl ReferenceResolver {
    /// Returns `true` if `import` is an import symbol that refers to `target`.
    pub fn refers_to(import: &Symbol, target: &Symbol) -> bool {
        if import.kind != SymbolKind::Import || import.file_path == target.file_path {
            return false;
        }
        let Some(info) = &import.import_info else {
            return false;
        };
        let name_matches = info.imported_name == target.name
            || info.imported_as.as_deref() == Some(target.name.as_str());
        name_matches && specifier_matches_file(&info.source, &target.file_path)
    }

    /// The reference an import symbol contributes to the symbol it imports.
    pub fn import_reference(import: &Symbol) -> SymbolReference {
        SymbolReference {
            file_path: import.file_path.clone(),
            span: import.span.clone(),
            kind: ReferenceKind::Import,
        }
    }

    /// Orders the import references that follow the definition reference.
    pub fn sort_references(references: &mut [SymbolReference]) {
        references.sort_by(|a, b| {
            (&a.file_path, a.span.start_line, a.span.start_column, a.span.end_line, a.span.end_column)
                .cmp(&(
                    &b.file_path,
                    b.span.start_line,
                    b.span.start_column,
                    b.span.end_line,
                    b.span.end_column,
                ))
        });
    }

    /// Recomputes every symbol's reference list from scratch.
    ///
    /// Cost is O(symbols x imports); the graph maintains references
    /// incrementally and keeps this as the reference result.
    pub fn rebuild_all(symbols: &mut BTreeMap<String, Symbol>) {
        let imports: Vec<Symbol> = symbols
            .values()
            .filter(|s| {
                s.import_info
                    .as_ref()
                    .is_some_and(|i| s.kind == SymbolKind::Import && is_relative_specifier(&i.source))
            })
            .map(|s| Symbol {
                references: Vec::new(),
                ..s.clone()
            })
            .collect();

        for symbol in symbols.values_mut() {
            let mut imported: Vec<SymbolReference> = imports
                .iter()
                .filter(|i| Self::refers_to(i, symbol))
                .map(Self::import_reference)
                .collect();
            Self::sort_references(&mut imported);

            let mut references = Vec::with_capacity(imported.len() + 1);
            references.push(symbol.definition_reference());
            references.extend(imported);
            symbol.references = references;
        }
    }
}

/// `./x`, `../x`, `.` and `..` are relative; everything else is a package
/// or alias specifier.
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Removes a trailing source extension, if any.
pub fn strip_source_extension(path: &str) -> &str {
    SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path)
}

/// The part of a relative specifier that names the module: leading `.` and
/// `..` segments and a trailing source extension removed. `None` when
/// nothing remains.
pub fn module_stem(specifier: &str) -> Option<String> {
    let rest: Vec<&str> = specifier
        .split('/')
        .skip_while(|seg| *seg == "." || *seg == "..")
        .filter(|seg| !seg.is_empty())
        .collect();
    let joined = rest.join("/");
    let stem = strip_source_extension(&joined);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Returns `true` if the relative `specifier` textually points at `file_path`.
pub fn specifier_matches_file(specifier: &str, file_path: &str) -> bool {
    if !is_relative_specifier(specifier) {
        return false;
    }
    match module_stem(specifier) {
        Some(stem) => strip_source_extension(file_path).contains(&stem),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems() {
        assert_eq!(module_stem("./a").as_deref(), Some("a"));
        assert_eq!(module_stem("../lib/util.js").as_deref(), Some("lib/util"));
        assert_eq!(module_stem("./types.d.ts").as_deref(), Some("types"));
        assert_eq!(module_stem("./components/").as_deref(), Some("components"));
        assert_eq!(module_stem("."), None);
        assert_eq!(module_stem("../.."), None);
    }

    #[test]
    fn relative_detection() {
        assert!(is_relative_specifier("./a"));
        assert!(is_relative_specifier("../a"));
        assert!(is_relative_specifier(".."));
        assert!(!is_relative_specifier("react"));
        assert!(!is_relative_specifier("@app/util"));
        assert!(!is_relative_specifier(".hidden"));
    }

    #[test]
    fn specifier_matching_is_textual() {
        assert!(specifier_matches_file("./a", "a.ts"));
        assert!(specifier_matches_file("../lib/util", "src/lib/util.ts"));
        assert!(specifier_matches_file("./util.js", "src/util.ts"));
        assert!(!specifier_matches_file("./b", "a.ts"));
        assert!(!specifier_matches_file("util", "util.ts"));
    }
}
