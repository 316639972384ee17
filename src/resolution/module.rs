use super::resolver::is_relative_specifier;

/// Extensions tried, in order, when a specifier names a module without one.
pub const PROBE_EXTENSIONS: &[&str] = &["ts", "tsx", "d.ts", "js", "jsx", "mjs", "cjs", "mts", "cts"];

/// Resolves a relative module specifier written in `from_file` to a file path.
///
/// Probes the exact path, the path with each of [`PROBE_EXTENSIONS`], the
/// TypeScript source behind a `.js`-style specifier, and finally
/// `<path>/index.<ext>`. `exists` decides which candidates are real files;
/// the graph passes its own file set. Returns `None` for package specifiers
/// and for paths that climb above the project root.
pub fn resolve_module(
    from_file: &str,
    specifier: &str,
    exists: impl Fn(&str) -> bool,
) -> Option<String> {
    if !is_relative_specifier(specifier) {
        return None;
    }
    let base_dir = from_file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let joined = join_normalized(base_dir, specifier)?;

    candidates(&joined).into_iter().find(|c| exists(c))
}

fn candidates(joined: &str) -> Vec<String> {
    let mut out = Vec::new();
    if !joined.is_empty() {
        out.push(joined.to_string());
        for ext in PROBE_EXTENSIONS {
            out.push(format!("{joined}.{ext}"));
        }
        // ESM-style TypeScript imports name the emitted `.js` file.
        for (js, ts) in [(".js", ".ts"), (".jsx", ".tsx"), (".mjs", ".mts"), (".cjs", ".cts")] {
            if let Some(stem) = joined.strip_suffix(js) {
                out.push(format!("{stem}{ts}"));
                if js == ".js" {
                    out.push(format!("{stem}.tsx"));
                }
            }
        }
    }
    let index = if joined.is_empty() {
        "index".to_string()
    } else {
        format!("{joined}/index")
    };
    for ext in PROBE_EXTENSIONS {
        out.push(format!("{index}.{ext}"));
    }
    out
}

/// Joins `rel` onto `base`, folding `.` and `..`. `None` if the result
/// would leave the root.
fn join_normalized(base: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in base.split('/').chain(rel.split('/')) {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}
