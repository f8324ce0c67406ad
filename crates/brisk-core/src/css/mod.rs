//! CSS processing using lightningcss.
//!
//! Provides:
//! - Parse + re-print (syntax validation) for the `css` stage
//! - Minification for the production optimizer
//! - `url(...)` discovery and rewriting for the bundler
//! - Sass/SCSS preprocessing (see [`sass`])

pub mod sass;

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use regex_lite::{Captures, Regex};
use std::ops::Range;
use std::sync::OnceLock;
use thiserror::Error;

/// CSS processing options.
#[derive(Debug, Clone, Default)]
pub struct CssOptions {
    /// Enable minification.
    pub minify: bool,
    /// Source file path (for error messages).
    pub filename: Option<String>,
}

/// CSS processing error.
#[derive(Debug, Error)]
pub enum CssError {
    #[error("CSS parse error in {file}: {message}")]
    Parse { file: String, message: String },
    #[error("CSS minify error: {0}")]
    Minify(String),
    #[error("CSS print error: {0}")]
    Print(String),
    #[error("Sass compilation error: {0}")]
    Sass(String),
}

/// Parse `source` and print it back, optionally minified.
pub fn process_css(source: &str, options: &CssOptions) -> Result<String, CssError> {
    let filename = options.filename.as_deref().unwrap_or("input.css");

    let parser_options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };

    let mut stylesheet = StyleSheet::parse(source, parser_options).map_err(|e| CssError::Parse {
        file: filename.to_string(),
        message: e.to_string(),
    })?;

    if options.minify {
        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| CssError::Minify(e.to_string()))?;
    }

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: options.minify,
            ..PrinterOptions::default()
        })
        .map_err(|e| CssError::Print(e.to_string()))?;

    Ok(output.code)
}

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"url\(\s*(?:"([^"\n]*)"|'([^'\n]*)'|([^)'"\s]*))\s*\)"#).ok()
        })
        .as_ref()
}

fn url_value<'a>(caps: &Captures<'a>) -> &'a str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str())
}

/// Import specifier for a `url(...)` value that names a file next to the
/// stylesheet, or `None` for data, remote, absolute, fragment and
/// preprocessor-interpolated values.
///
/// Query and fragment suffixes are dropped. A bare `img/a.png` is relative
/// to the stylesheet; `~pkg/a.png` names a package.
#[must_use]
pub fn local_specifier(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.starts_with('/')
        || raw.starts_with('#')
        || raw.contains(':')
        || raw.contains('$')
        || raw.contains("#{")
    {
        return None;
    }

    let path = raw.split(['?', '#']).next().unwrap_or(raw);
    if path.is_empty() {
        return None;
    }
    Some(if let Some(package) = path.strip_prefix('~') {
        package.to_string()
    } else if path.starts_with("./") || path.starts_with("../") {
        path.to_string()
    } else {
        format!("./{path}")
    })
}

/// Local file references in `source`, with the byte range of each `url(...)`.
#[must_use]
pub fn url_references(source: &str) -> Vec<(String, Range<usize>)> {
    let Some(re) = url_pattern() else {
        return Vec::new();
    };
    re.captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let specifier = local_specifier(url_value(&caps))?;
            Some((specifier, whole.start()..whole.end()))
        })
        .collect()
}

/// Replace each `url(...)` for which `replace` returns a new location. The
/// query and fragment of the original value are kept.
pub fn rewrite_urls(source: &str, mut replace: impl FnMut(&str) -> Option<String>) -> String {
    let Some(re) = url_pattern() else {
        return source.to_string();
    };
    re.replace_all(source, |caps: &Captures<'_>| {
        let raw = url_value(caps);
        match replace(raw) {
            Some(url) => {
                let suffix = raw.find(['?', '#']).map_or("", |i| &raw[i..]);
                format!("url({url}{suffix})")
            }
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

/// Minify CSS, falling back to whitespace/comment stripping when lightningcss
/// rejects the input.
#[must_use]
pub fn minify_css(source: &str) -> String {
    let options = CssOptions {
        minify: true,
        filename: None,
    };

    match process_css(source, &options) {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!(error = %e, "lightningcss minify failed, using basic minifier");
            basic_css_minify(source)
        }
    }
}

/// Comment removal and whitespace collapse.
#[must_use]
pub fn basic_css_minify(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut in_comment = false;
    let mut last_char = ' ';

    for c in content.chars() {
        if in_comment {
            if last_char == '*' && c == '/' {
                in_comment = false;
                last_char = ' ';
            } else {
                last_char = c;
            }
            continue;
        }

        if last_char == '/' && c == '*' {
            in_comment = true;
            result.pop();
            last_char = c;
            continue;
        }

        if c.is_whitespace() {
            if !last_char.is_whitespace() && !matches!(last_char, '{' | ';' | ':' | ',') {
                result.push(' ');
            }
            last_char = ' ';
            continue;
        }

        if last_char == ' ' && matches!(c, '{' | '}' | ';' | ':' | ',') && result.ends_with(' ') {
            result.pop();
        }

        result.push(c);
        last_char = c;
    }

    result.trim().to_string()
}
