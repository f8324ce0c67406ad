//! Minification of script and style assets.
//!
//! Styles go through lightningcss. Scripts get a token-aware pass that drops
//! comments and collapses whitespace while copying string, template and
//! regular-expression literals verbatim. Newlines that may carry an implicit
//! semicolon are kept.

use crate::bundler::assets::{Asset, AssetKind};
use crate::bundler::plugin::{HookResult, Plugin, PluginContext};
use crate::css::minify_css;

/// Minifies `js` and `css` assets.
#[derive(Debug, Default)]
pub struct MinifyPlugin;

impl MinifyPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for MinifyPlugin {
    fn name(&self) -> &str {
        "minify"
    }

    fn on_asset(&self, _ctx: &mut PluginContext<'_>, asset: &mut Asset) -> HookResult {
        let minified = match asset.kind {
            AssetKind::Js => minify_script(&asset.text()),
            AssetKind::Css => minify_css(&asset.text()),
            _ => return Ok(()),
        };
        tracing::debug!(
            asset = %asset.name,
            before = asset.content.len(),
            after = minified.len(),
            "minified"
        );
        asset.content = minified.into_bytes();
        Ok(())
    }
}

const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Strip comments and redundant whitespace from script source.
#[must_use]
pub fn minify_script(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(source.len());
    // Some(true) when the skipped gap contained a newline.
    let mut gap: Option<bool> = None;
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if c.is_whitespace() {
            gap = Some(gap.unwrap_or(false) || c == '\n');
            i += 1;
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let mut newline = false;
            i += 2;
            while i < len && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                newline |= chars[i] == '\n';
                i += 1;
            }
            i = (i + 2).min(len);
            gap = Some(gap.unwrap_or(false) || newline);
            continue;
        }

        if let Some(newline) = gap.take() {
            push_separator(&mut out, newline, c);
        }

        match c {
            '"' | '\'' | '`' => i = copy_quoted(&chars, i, &mut out),
            '/' if regex_allowed(&out) => i = copy_regex(&chars, i, &mut out),
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn push_separator(out: &mut String, newline: bool, next: char) {
    let Some(prev) = out.chars().last() else {
        return;
    };

    // A postfix `++`/`--` ends a statement; the newline is what separates it
    // from the next one.
    let postfix = out.ends_with("++") || out.ends_with("--");
    let newline_needed = newline
        && (postfix
            || !matches!(
                prev,
                '{' | ';' | ',' | '(' | '[' | '=' | ':' | '&' | '|' | '?' | '+' | '-' | '*'
                    | '/' | '<' | '>' | '!'
            ))
        && !matches!(
            next,
            '}' | ')' | ']' | ',' | ';' | '.' | '?' | ':' | '=' | '&' | '|'
        );

    if newline_needed {
        out.push('\n');
    } else if (is_ident(prev) && is_ident(next)) || ((prev == '+' || prev == '-') && prev == next)
    {
        out.push(' ');
    }
}

/// Copy a string or template literal starting at `start`; returns the index after it.
fn copy_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push(quote);
    let mut i = start + 1;

    while i < chars.len() {
        let ch = chars[i];
        out.push(ch);
        if ch == '\\' {
            if let Some(&escaped) = chars.get(i + 1) {
                out.push(escaped);
            }
            i += 2;
            continue;
        }
        i += 1;
        if ch == quote {
            break;
        }
    }

    i
}

/// Copy a regular-expression literal (without flags) starting at `start`.
fn copy_regex(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('/');
    let mut i = start + 1;
    let mut in_class = false;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '\n' {
            break;
        }
        out.push(ch);
        i += 1;
        match ch {
            '\\' => {
                if let Some(&escaped) = chars.get(i) {
                    out.push(escaped);
                    i += 1;
                }
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => break,
            _ => {}
        }
    }

    i
}

/// Whether a `/` at this point starts a regular expression rather than a division.
fn regex_allowed(out: &str) -> bool {
    let trimmed = out.trim_end();
    let Some(prev) = trimmed.chars().last() else {
        return true;
    };

    if is_ident(prev) {
        let word_start = trimmed
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_ident(*c))
            .last()
            .map_or(0, |(i, _)| i);
        return REGEX_KEYWORDS.contains(&&trimmed[word_start..]);
    }

    !matches!(prev, ')' | ']' | '}' | '"' | '\'' | '`')
}
