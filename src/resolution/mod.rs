/// Reference and module resolution.
///
/// `resolver` matches import symbols to the declarations they name, which
/// drives every symbol's reference list. `module` maps relative specifiers to
/// concrete files for the resolved dependency views.
mod module;
mod resolver;

pub use module::{resolve_module, PROBE_EXTENSIONS};
pub use resolver::{
    is_relative_specifier, module_stem, specifier_matches_file, strip_source_extension,
    ReferenceResolver, SOURCE_EXTENSIONS,
};
