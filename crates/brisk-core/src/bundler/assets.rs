//! Build assets and output naming.
//!
//! An [`Asset`] is one file the build will emit. Its `output_path` starts as a
//! rendered template and may still hold a `[contenthash]` / `[contenthash:N]`
//! placeholder until the content-hash stage replaces it.

use serde::Serialize;
use std::path::PathBuf;

/// Default length of a `[contenthash]` without an explicit `:N`.
pub const DEFAULT_HASH_LEN: usize = 20;

/// Category of an emitted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Js,
    Css,
    Media,
    Font,
    Html,
    Map,
    Compressed,
    Report,
    Other,
}

impl AssetKind {
    /// Guess the kind from an output path's extension.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("js" | "mjs") => Self::Js,
            Some("css") => Self::Css,
            Some("html" | "htm") => Self::Html,
            Some("map") => Self::Map,
            Some("br" | "gz") => Self::Compressed,
            Some("png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" | "avif") => Self::Media,
            Some("eot" | "ttf" | "otf" | "woff" | "woff2") => Self::Font,
            _ => Self::Other,
        }
    }
}

/// One file to be emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Stable logical name (manifest key), e.g. `main.js` or `src/logo.png`.
    pub name: String,
    /// Path relative to the output root.
    pub output_path: String,
    pub content: Vec<u8>,
    /// Logical name of the companion source map, if any.
    pub source_map: Option<String>,
    pub kind: AssetKind,
    /// Modules this asset was produced from.
    pub source_modules: Vec<PathBuf>,
}

impl Asset {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        output_path: impl Into<String>,
        kind: AssetKind,
        content: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            output_path: output_path.into(),
            content,
            source_map: None,
            kind,
            source_modules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.source_modules = sources;
        self
    }

    /// Public URL of the asset (output root served at `/`).
    #[must_use]
    pub fn url(&self) -> String {
        public_url(&self.output_path)
    }

    /// Content as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Public URL for an output path.
#[must_use]
pub fn public_url(output_path: &str) -> String {
    format!("/{}", output_path.trim_start_matches('/'))
}

/// Values substituted into a naming template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateVars<'a> {
    /// `[name]`: file stem.
    pub name: &'a str,
    /// `[ext]`: extension without the dot.
    pub ext: &'a str,
    /// `[path]`: directory relative to the root, with a trailing `/` (or empty).
    pub path: &'a str,
    /// Bytes for `[contenthash]`; placeholders are kept when absent.
    pub content: Option<&'a [u8]>,
}

/// Render a naming template.
#[must_use]
pub fn render_template(template: &str, vars: &TemplateVars<'_>) -> String {
    replace_tokens(template, |token| match token {
        "name" => Some(vars.name.to_string()),
        "ext" => Some(vars.ext.to_string()),
        "path" => Some(vars.path.to_string()),
        _ => {
            let len = hash_len(token)?;
            vars.content
                .map(|content| brisk_util::hash::short_hash(content, len))
        }
    })
}

/// Replace only the `[contenthash]` placeholders in `path` with the digest of
/// `content`.
#[must_use]
pub fn substitute_content_hash(path: &str, content: &[u8]) -> String {
    replace_tokens(path, |token| {
        hash_len(token).map(|len| brisk_util::hash::short_hash(content, len))
    })
}

/// Whether `path` still contains a content-hash placeholder.
#[must_use]
pub fn has_hash_placeholder(path: &str) -> bool {
    let mut rest = path;
    while let Some(start) = rest.find('[') {
        let after = &rest[start + 1..];
        let Some(end) = after.find(']') else {
            return false;
        };
        if hash_len(&after[..end]).is_some() {
            return true;
        }
        rest = &after[end + 1..];
    }
    false
}

/// `contenthash` → default length, `contenthash:N` → N.
fn hash_len(token: &str) -> Option<usize> {
    match token.strip_prefix("contenthash")? {
        "" => Some(DEFAULT_HASH_LEN),
        rest => rest.strip_prefix(':')?.parse().ok(),
    }
}

fn replace_tokens(template: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('[') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find(']') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let token = &after[..end];
        match lookup(token) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('[');
                out.push_str(token);
                out.push(']');
            }
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Content type for serving an output path.
#[must_use]
pub fn content_type(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template_all_tokens() {
        let vars = TemplateVars {
            name: "logo",
            ext: "png",
            path: "src/assets/",
            content: Some(b"hello world"),
        };
        assert_eq!(
            render_template("static/media/[name].[contenthash:6].[ext]", &vars),
            "static/media/logo.d74981.png"
        );
        assert_eq!(render_template("[path][name].[ext]", &vars), "src/assets/logo.png");
        assert_eq!(
            render_template("[contenthash]", &vars),
            "d74981efa70a0c880b8d"
        );
    }

    #[test]
    fn test_render_template_keeps_hash_without_content() {
        let vars = TemplateVars {
            name: "main",
            ext: "js",
            ..TemplateVars::default()
        };
        let rendered = render_template("static/js/[name].[contenthash:6].js", &vars);
        assert_eq!(rendered, "static/js/main.[contenthash:6].js");
        assert!(has_hash_placeholder(&rendered));

        let hashed = substitute_content_hash(&rendered, b"hello world");
        assert_eq!(hashed, "static/js/main.d74981.js");
        assert!(!has_hash_placeholder(&hashed));
    }

    #[test]
    fn test_unknown_tokens_kept() {
        let vars = TemplateVars::default();
        assert_eq!(render_template("a/[unknown]/[b", &vars), "a/[unknown]/[b");
        assert!(!has_hash_placeholder("a/[contenthash:x].js"));
    }

    #[test]
    fn test_asset_kind_and_content_type() {
        assert_eq!(AssetKind::from_path("static/js/main.js"), AssetKind::Js);
        assert_eq!(AssetKind::from_path("static/js/main.js.br"), AssetKind::Compressed);
        assert_eq!(AssetKind::from_path("favicon.ico"), AssetKind::Media);
        assert_eq!(content_type("index.html"), "text/html; charset=utf-8");
        assert_eq!(content_type("static/fonts/a.woff2"), "font/woff2");
    }

    #[test]
    fn test_public_url() {
        assert_eq!(public_url("static/js/main.js"), "/static/js/main.js");
    }
}
