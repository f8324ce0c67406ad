//! Import statement scanner.
//!
//! Finds module references in script source without full parsing. Each hit
//! carries the byte span of the whole statement (or call expression) so the
//! bundler can rewrite it in place.
//!
//! Recognized forms:
//!
//! - `import x from "mod"` / `import { a } from "mod"` / `import * as ns from "mod"`
//! - `import "mod"`
//! - `export { a } from "mod"` / `export * from "mod"`
//! - `import("mod")`
//! - `require("mod")`
//!
//! Matches that start inside a comment are ignored.

use regex_lite::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::OnceLock;

/// How a module is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    Static,
    SideEffect,
    ReExport,
    Dynamic,
    Require,
    /// `url(...)` in a stylesheet.
    StyleUrl,
}

/// One reference to another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// Specifier exactly as written.
    pub specifier: String,
    pub kind: ImportKind,
    /// `x` in `import x from ...`.
    pub default_binding: Option<String>,
    /// `ns` in `import * as ns from ...` or `export * as ns from ...`.
    pub namespace_binding: Option<String>,
    /// Names inside the braces. A re-export with no names and no namespace
    /// is `export * from ...`.
    pub named: Vec<NamedBinding>,
    /// Byte range of the statement or call expression.
    pub span: Range<usize>,
}

/// One `imported as local` entry of a braced clause. For re-exports `local`
/// is the exported name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBinding {
    pub imported: String,
    pub local: String,
}

impl NamedBinding {
    #[must_use]
    pub fn new(imported: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            imported: imported.into(),
            local: local.into(),
        }
    }
}

impl ImportStatement {
    /// A reference with no bindings.
    #[must_use]
    pub fn bare(specifier: impl Into<String>, kind: ImportKind, span: Range<usize>) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            default_binding: None,
            namespace_binding: None,
            named: Vec::new(),
            span,
        }
    }
}

struct Patterns {
    from_clause: Option<Regex>,
    side_effect: Option<Regex>,
    call: Option<Regex>,
    namespace: Option<Regex>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        from_clause: Regex::new(
            r#"(?m)^[ \t]*(import|export)[ \t]+((?:[\w$*, \t]|\{[^}]*\})+?)[ \t]*from[ \t]*["']([^"'\n]+)["'][ \t]*;?"#,
        )
        .ok(),
        side_effect: Regex::new(r#"(?m)^[ \t]*import\s*["']([^"'\n]+)["'][ \t]*;?"#).ok(),
        call: Regex::new(r#"\b(import|require)\s*\(\s*["']([^"'\n]+)["']\s*\)"#).ok(),
        namespace: Regex::new(r"\*\s*as\s+([\w$]+)").ok(),
    })
}

/// Scan `source` for module references, in source order.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportStatement> {
    let patterns = patterns();
    let comments = comment_spans(source);
    let in_comment = |pos: usize| comments.iter().any(|c| c.contains(&pos));

    let mut results = Vec::new();

    if let Some(re) = &patterns.from_clause {
        for caps in re.captures_iter(source) {
            let (Some(whole), Some(keyword), Some(clause), Some(spec)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            if in_comment(start) {
                continue;
            }

            let clause = clause.as_str().trim();
            let (kind, default_binding) = if keyword.as_str() == "export" {
                (ImportKind::ReExport, None)
            } else {
                (ImportKind::Static, default_binding(clause))
            };
            let namespace_binding = patterns
                .namespace
                .as_ref()
                .and_then(|ns| ns.captures(clause))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());

            results.push(ImportStatement {
                specifier: spec.as_str().to_string(),
                kind,
                default_binding,
                namespace_binding,
                named: named_bindings(clause),
                span: whole.start()..whole.end(),
            });
        }
    }

    if let Some(re) = &patterns.side_effect {
        for caps in re.captures_iter(source) {
            let (Some(whole), Some(spec)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            if in_comment(start) {
                continue;
            }
            results.push(ImportStatement::bare(
                spec.as_str(),
                ImportKind::SideEffect,
                whole.start()..whole.end(),
            ));
        }
    }

    if let Some(re) = &patterns.call {
        for caps in re.captures_iter(source) {
            let (Some(whole), Some(callee), Some(spec)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if in_comment(whole.start()) {
                continue;
            }
            let kind = if callee.as_str() == "import" {
                ImportKind::Dynamic
            } else {
                ImportKind::Require
            };
            results.push(ImportStatement::bare(
                spec.as_str(),
                kind,
                whole.start()..whole.end(),
            ));
        }
    }

    results.sort_by_key(|s| s.span.start);
    results
}

/// `x` in an import clause like `x, { y }`, unless the import is type-only.
fn default_binding(clause: &str) -> Option<String> {
    let first = clause.split(',').next()?.trim();
    let is_ident = first
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    (is_ident && first != "type").then(|| first.to_string())
}

/// Entries of the braced part of a clause like `x, { a, b as c }`. Type-only
/// clauses and `type` entries bind nothing at runtime and are skipped.
fn named_bindings(clause: &str) -> Vec<NamedBinding> {
    if clause.starts_with("type ") || clause.starts_with("type{") {
        return Vec::new();
    }
    let (Some(open), Some(close)) = (clause.find('{'), clause.rfind('}')) else {
        return Vec::new();
    };
    if close < open {
        return Vec::new();
    }

    clause[open + 1..close]
        .split(',')
        .filter_map(|entry| {
            let words: Vec<&str> = entry.split_whitespace().collect();
            match words.as_slice() {
                ["type", ..] | [] => None,
                [name] => Some(NamedBinding::new(*name, *name)),
                [imported, "as", local] => Some(NamedBinding::new(*imported, *local)),
                _ => None,
            }
        })
        .collect()
}

/// Byte ranges of `//` and `/* */` comments, skipping string and template literals.
fn comment_spans(source: &str) -> Vec<Range<usize>> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    } else if bytes[i] == b'\n' && quote != b'`' {
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                spans.push(start..i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                spans.push(start..i);
            }
            _ => i += 1,
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(source: &str) -> Vec<(String, ImportKind)> {
        scan_imports(source)
            .into_iter()
            .map(|s| (s.specifier, s.kind))
            .collect()
    }

    #[test]
    fn test_scan_static_forms() {
        let source = r#"import React from "react";
import { a, b } from './lib';
import * as ns from "./ns";
import type { Props } from './types';
import "./app.scss";
export * from "./reexport";
"#;
        assert_eq!(
            specs(source),
            vec![
                ("react".to_string(), ImportKind::Static),
                ("./lib".to_string(), ImportKind::Static),
                ("./ns".to_string(), ImportKind::Static),
                ("./types".to_string(), ImportKind::Static),
                ("./app.scss".to_string(), ImportKind::SideEffect),
                ("./reexport".to_string(), ImportKind::ReExport),
            ]
        );
    }

    #[test]
    fn test_bindings() {
        let imports = scan_imports(
            "import logo from './logo.png';\nimport * as icons from './icons.svg';\nimport type T from './t';\n",
        );
        assert_eq!(imports[0].default_binding.as_deref(), Some("logo"));
        assert_eq!(imports[1].namespace_binding.as_deref(), Some("icons"));
        assert_eq!(imports[1].default_binding, None);
        assert_eq!(imports[2].default_binding, None);
    }

    #[test]
    fn test_named_bindings() {
        let imports = scan_imports(
            "import React, { useState, add as plus, type Props } from 'react';\nexport { a as b, c } from './c';\nexport * as all from './all';\nexport * from './star';\nimport type { T } from './t';\n",
        );
        assert_eq!(imports[0].default_binding.as_deref(), Some("React"));
        assert_eq!(
            imports[0].named,
            vec![NamedBinding::new("useState", "useState"), NamedBinding::new("add", "plus")]
        );
        assert_eq!(imports[1].kind, ImportKind::ReExport);
        assert_eq!(
            imports[1].named,
            vec![NamedBinding::new("a", "b"), NamedBinding::new("c", "c")]
        );
        assert_eq!(imports[2].namespace_binding.as_deref(), Some("all"));
        assert!(imports[3].named.is_empty() && imports[3].namespace_binding.is_none());
        assert!(imports[4].named.is_empty());
    }

    #[test]
    fn test_multiline_named_import() {
        let source = "import {\n  one,\n  two,\n} from './many';\nconsole.log(one);\n";
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 1);
        assert_eq!(&source[imports[0].span.clone()], "import {\n  one,\n  two,\n} from './many';");
    }

    #[test]
    fn test_statement_does_not_span_lines() {
        let source = "export default App\nimport x from './y';\n";
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].kind, ImportKind::Static);
        assert_eq!(imports[0].default_binding.as_deref(), Some("x"));
    }

    #[test]
    fn test_calls() {
        let source = "const a = require('./a');\nconst b = await import(\"./b\");\n";
        assert_eq!(
            specs(source),
            vec![
                ("./a".to_string(), ImportKind::Require),
                ("./b".to_string(), ImportKind::Dynamic),
            ]
        );
        let imports = scan_imports(source);
        assert_eq!(&source[imports[0].span.clone()], "require('./a')");
    }

    #[test]
    fn test_comments_ignored() {
        let source = "// import x from './nope';\n/* require('./nope2') */\nconst url = \"http://x\"; import('./yes');\n";
        assert_eq!(specs(source), vec![("./yes".to_string(), ImportKind::Dynamic)]);
    }
}
