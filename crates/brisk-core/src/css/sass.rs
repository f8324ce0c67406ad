//! Sass/SCSS preprocessing using grass.
//!
//! Compiles `.scss` and `.sass` sources to expanded CSS. The source file's
//! directory is added as a load path so relative `@use`/`@import` work.

use std::path::Path;

use super::CssError;

/// Whether `path` needs the Sass compiler.
#[must_use]
pub fn is_sass_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("scss") || e.eq_ignore_ascii_case("sass"))
}

/// Compile Sass/SCSS to CSS.
///
/// Supports both `.scss` (Sassy CSS) and `.sass` (indented syntax), chosen by
/// the extension of `path`.
pub fn compile_sass(source: &str, path: &Path) -> Result<String, CssError> {
    let is_indented = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sass"));

    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    if is_indented {
        options = options.input_syntax(grass::InputSyntax::Sass);
    }
    if let Some(parent) = path.parent() {
        options = options.load_path(parent);
    }

    grass::from_string(source.to_string(), &options).map_err(|e| CssError::Sass(e.to_string()))
}
