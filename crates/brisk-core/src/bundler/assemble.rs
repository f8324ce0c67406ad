//! Turning transformed modules into bundle assets.
//!
//! The script bundle starts with a small module registry. Every bundled
//! module becomes a function keyed by its id that runs the first time it is
//! required, in its own scope; the entries are required at the end. Import
//! statements are rewritten in place:
//!
//! - imports of bundled modules bind from `__brisk_require(id)`
//! - imports of extracted styles bind an empty object
//! - imports of file assets become the asset's public URL
//! - imports of JSON become the JSON value
//!
//! Exported declarations stay where they are without the `export` keyword
//! and are published through getters, so importers always read the current
//! binding. `url(...)` references in styles point at the emitted files.
//!
//! Rewrites keep the number of lines of the original statement so the
//! development source map can map bundle lines back to source lines.

use regex_lite::Regex;
use rustc_hash::FxHashMap as HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::assets::{public_url, render_template, Asset, AssetKind, TemplateVars};
use super::graph::{ModuleGraph, ModuleId, ModuleKind};
use super::imports::{scan_imports, ImportKind, ImportStatement, NamedBinding};
use super::sourcemap::SourceMapBuilder;
use super::transform::{file_name, Emit, ModuleOutput};
use crate::config::BuildConfig;
use crate::css::{local_specifier, rewrite_urls};

/// Logical name of the script bundle.
pub const SCRIPT_BUNDLE: &str = "main.js";
/// Logical name of the extracted style bundle.
pub const STYLE_BUNDLE: &str = "main.css";

const BUNDLE_NAME: &str = "main";

/// Module registry at the top of every script bundle.
const RUNTIME: &str = r#"var __brisk_modules = {};
var __brisk_cache = {};
function __brisk_require(id) {
  var cached = __brisk_cache[id];
  if (cached) return cached.exports;
  var module = (__brisk_cache[id] = { exports: {} });
  __brisk_modules[id](module, module.exports);
  return module.exports;
}
function __brisk_export(exports, getters) {
  Object.defineProperty(exports, "__esModule", { value: true });
  Object.keys(getters).forEach(function (name) {
    Object.defineProperty(exports, name, { enumerable: true, get: getters[name] });
  });
}
function __brisk_star(exports, source) {
  Object.keys(source).forEach(function (name) {
    if (name !== "default" && !Object.prototype.hasOwnProperty.call(exports, name)) {
      Object.defineProperty(exports, name, { enumerable: true, get: function () { return source[name]; } });
    }
  });
}
function __brisk_default(exports) {
  return exports && exports.__esModule ? exports.default : exports;
}
"#;

/// Binding that holds an anonymous default export.
const DEFAULT_LOCAL: &str = "__brisk_default_export";

/// What importing scripts see in place of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    /// Registered in the script bundle under this id.
    Module(ModuleId),
    /// Part of the extracted style bundle; nothing to bind.
    Extracted,
    /// A standalone file; the value is its URL.
    Url(String),
    /// JSON data; the value is the JSON text.
    Json(String),
}

/// Where each module ended up after its chain ran.
#[derive(Debug, Default)]
pub struct Placement {
    /// Output path of every module emitted as a file.
    files: HashMap<ModuleId, String>,
}

impl Placement {
    /// Decide file output paths, falling back to the media or font template
    /// for assets that no rule turned into files.
    #[must_use]
    pub fn new(
        graph: &ModuleGraph,
        outputs: &HashMap<ModuleId, ModuleOutput>,
        config: &BuildConfig,
    ) -> Self {
        let mut files = HashMap::default();
        for module in graph.iter() {
            let Some(output) = outputs.get(&module.id) else {
                continue;
            };
            let name = match (&output.emit, module.kind) {
                (Emit::File { name }, _) => name.clone(),
                (_, ModuleKind::Asset) => {
                    file_name(&config.output.media, &module.path, &output.content, config)
                }
                (_, ModuleKind::Font) => {
                    file_name(&config.output.font, &module.path, &output.content, config)
                }
                _ => continue,
            };
            files.insert(module.id, name);
        }
        Self { files }
    }

    #[must_use]
    pub fn file(&self, id: ModuleId) -> Option<&str> {
        self.files.get(&id).map(String::as_str)
    }
}

fn binding_for(
    graph: &ModuleGraph,
    outputs: &HashMap<ModuleId, ModuleOutput>,
    placement: &Placement,
    id: ModuleId,
) -> Binding {
    if let Some(path) = placement.file(id) {
        return Binding::Url(public_url(path));
    }
    if let Some(output) = outputs.get(&id) {
        if output.emit == Emit::ExtractStyle {
            return Binding::Extracted;
        }
        if graph.get(id).is_some_and(|m| is_json(&m.path)) {
            let text = String::from_utf8_lossy(&output.content);
            return Binding::Json(text.trim().to_string());
        }
    }
    Binding::Module(id)
}

fn require_call(id: ModuleId) -> String {
    format!("__brisk_require({id})")
}

/// Names a module publishes.
#[derive(Debug, Default, PartialEq, Eq)]
struct Exports {
    /// Exported name and the expression that reads it.
    named: Vec<(String, String)>,
    /// Modules whose exports are re-published (`export * from`).
    stars: Vec<String>,
}

impl Exports {
    /// Statements that publish the exports on the module's `exports` object.
    fn registration(&self) -> String {
        if self.named.is_empty() && self.stars.is_empty() {
            return String::new();
        }
        let getters: Vec<String> = self
            .named
            .iter()
            .map(|(name, expr)| {
                let body = if expr.starts_with('{') {
                    format!("({expr})")
                } else {
                    expr.clone()
                };
                format!("{}: () => {body}", property(name))
            })
            .collect();
        let mut out = format!("__brisk_export(exports, {{ {} }});", getters.join(", "));
        for source in &self.stars {
            out.push_str(&format!(" __brisk_star(exports, {source});"));
        }
        out
    }
}

fn property(name: &str) -> String {
    if identifier(name) == Some(name) {
        name.to_string()
    } else {
        serde_json::to_string(name).unwrap_or_else(|_| format!("\"{name}\""))
    }
}

/// `{ a, b: c }` for named imports `{ a, b as c }`.
fn destructure(named: &[NamedBinding]) -> String {
    let fields: Vec<String> = named
        .iter()
        .map(|b| {
            if b.imported == b.local {
                b.local.clone()
            } else {
                format!("{}: {}", property(&b.imported), b.local)
            }
        })
        .collect();
    format!("{{ {} }}", fields.join(", "))
}

/// Replacement text for one import statement, or `None` to keep it.
/// Re-exports are recorded in `exports`.
fn rewrite(stmt: &ImportStatement, binding: &Binding, exports: &mut Exports) -> Option<String> {
    let value = match binding {
        Binding::Module(id) => require_call(*id),
        Binding::Extracted => "{}".to_string(),
        Binding::Url(url) => serde_json::to_string(url).unwrap_or_else(|_| format!("\"{url}\"")),
        Binding::Json(json) => json.clone(),
    };
    let module = matches!(binding, Binding::Module(_));
    let namespace = if module {
        value.clone()
    } else {
        format!("{{ default: {value} }}")
    };

    Some(match stmt.kind {
        ImportKind::Static => {
            let mut decls = Vec::new();
            if let Some(name) = &stmt.default_binding {
                if module {
                    decls.push(format!("const {name} = __brisk_default({value});"));
                } else {
                    decls.push(format!("const {name} = {value};"));
                }
            }
            if let Some(ns) = &stmt.namespace_binding {
                decls.push(format!("const {ns} = {namespace};"));
            }
            if !stmt.named.is_empty() {
                let source = match binding {
                    Binding::Module(_) | Binding::Json(_) => &value,
                    Binding::Url(_) | Binding::Extracted => &namespace,
                };
                decls.push(format!("const {} = {source};", destructure(&stmt.named)));
            }
            if decls.is_empty() && module {
                decls.push(format!("{value};"));
            }
            decls.join(" ")
        }
        ImportKind::SideEffect if module => format!("{value};"),
        ImportKind::SideEffect => String::new(),
        ImportKind::ReExport => {
            if let Some(ns) = &stmt.namespace_binding {
                exports.named.push((ns.clone(), namespace));
            } else if stmt.named.is_empty() {
                if module {
                    exports.stars.push(value.clone());
                }
            } else {
                for b in &stmt.named {
                    let expr = if !module && b.imported == "default" {
                        value.clone()
                    } else {
                        format!("{namespace}.{}", b.imported)
                    };
                    exports.named.push((b.local.clone(), expr));
                }
            }
            if module {
                format!("{value};")
            } else {
                String::new()
            }
        }
        ImportKind::Dynamic if module => format!("Promise.resolve().then(() => {value})"),
        ImportKind::Dynamic => format!("Promise.resolve({namespace})"),
        ImportKind::Require if module => value,
        ImportKind::Require => format!("({value})"),
        ImportKind::StyleUrl => return None,
    })
}

/// Keep the line count of `original` by appending the newlines it spanned.
fn pad_lines(mut replacement: String, original: &str) -> String {
    let have = replacement.matches('\n').count();
    let want = original.matches('\n').count();
    for _ in have..want {
        replacement.push('\n');
    }
    replacement
}

fn export_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?m)^[ \t]*export\b[ \t]*").ok())
        .as_ref()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// The identifier at the start of `s`.
fn identifier(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !is_ident_char(c)).unwrap_or(s.len());
    let ident = &s[..end];
    (!ident.is_empty() && !ident.starts_with(|c: char| c.is_ascii_digit())).then_some(ident)
}

/// `rest` after `word` when `word` is a whole word at its start.
fn keyword<'a>(rest: &'a str, word: &str) -> Option<&'a str> {
    let after = rest.strip_prefix(word)?;
    (!after.starts_with(is_ident_char)).then_some(after)
}

/// Bindings created by the declaration at the start of `decl`.
fn declared_names(decl: &str) -> Option<Vec<String>> {
    let decl = match keyword(decl, "async") {
        Some(after) => keyword(after.trim_start_matches([' ', '\t']), "function").map(|_| {
            after.trim_start_matches([' ', '\t'])
        })?,
        None => decl,
    };
    if let Some(after) = keyword(decl, "function") {
        let after = after.trim_start().trim_start_matches('*').trim_start();
        return identifier(after).map(|name| vec![name.to_string()]);
    }
    if let Some(after) = keyword(decl, "class") {
        return identifier(after.trim_start())
            .filter(|name| *name != "extends")
            .map(|name| vec![name.to_string()]);
    }
    for word in ["const", "let", "var"] {
        if let Some(after) = keyword(decl, word) {
            let after = after.trim_start();
            return match after.chars().next() {
                Some('{') => pattern_names(after, '}'),
                Some('[') => pattern_names(after, ']'),
                _ => identifier(after).map(|name| vec![name.to_string()]),
            };
        }
    }
    None
}

/// Names bound by a flat `{ a, b: c, ...d }` or `[a, , b = 1]` pattern.
fn pattern_names(pattern: &str, close: char) -> Option<Vec<String>> {
    let end = pattern.find(close)?;
    Some(
        pattern[1..end]
            .split(',')
            .filter_map(|entry| {
                let entry = entry.split('=').next()?;
                let entry = entry.rsplit(':').next()?.trim();
                identifier(entry.trim_start_matches("...")).map(str::to_string)
            })
            .collect(),
    )
}

/// Handle the export form that starts at `rest` (just after `export`).
/// Returns how many bytes of `rest` it covers and what replaces
/// `export` plus those bytes.
fn export_form(rest: &str, exports: &mut Exports) -> Option<(usize, String)> {
    if let Some(after) = keyword(rest, "default") {
        let value = after.trim_start_matches([' ', '\t']);
        let consumed = rest.len() - value.len();
        let declared = ["function", "async", "class"]
            .iter()
            .any(|word| keyword(value, word).is_some())
            .then(|| declared_names(value))
            .flatten()
            .and_then(|names| names.into_iter().next());
        return Some(match declared {
            Some(name) => {
                exports.named.push(("default".to_string(), name));
                (consumed, String::new())
            }
            None => {
                exports
                    .named
                    .push(("default".to_string(), DEFAULT_LOCAL.to_string()));
                (consumed, format!("var {DEFAULT_LOCAL} = "))
            }
        });
    }

    if rest.starts_with('{') {
        let close = rest.find('}')?;
        let tail = &rest[close + 1..];
        if keyword(tail.trim_start(), "from").is_some() {
            return None;
        }
        for entry in rest[1..close].split(',') {
            let words: Vec<&str> = entry.split_whitespace().collect();
            match words.as_slice() {
                [name] => exports.named.push(((*name).to_string(), (*name).to_string())),
                [local, "as", exported] => {
                    exports.named.push(((*exported).to_string(), (*local).to_string()));
                }
                _ => {}
            }
        }
        let spaces = tail.len() - tail.trim_start_matches([' ', '\t']).len();
        let semicolon = usize::from(tail[spaces..].starts_with(';'));
        let consumed = close + 1 + spaces + semicolon;
        return Some((consumed, pad_lines(String::new(), &rest[..consumed])));
    }

    let names = declared_names(rest)?;
    exports
        .named
        .extend(names.into_iter().map(|name| (name.clone(), name)));
    Some((0, String::new()))
}

/// Remove `export` syntax from `source` and collect what it exported.
/// Forms that bind nothing at runtime (`export type`, `export interface`)
/// are left alone.
fn collect_exports(source: &str) -> (String, Exports) {
    let mut exports = Exports::default();
    let Some(re) = export_pattern() else {
        return (source.to_string(), exports);
    };

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for m in re.find_iter(source) {
        if m.start() < cursor {
            continue;
        }
        let Some((consumed, replacement)) = export_form(&source[m.end()..], &mut exports) else {
            continue;
        };
        let keyword_start = m.start() + m.as_str().find("export").unwrap_or(0);
        out.push_str(&source[cursor..keyword_start]);
        out.push_str(&replacement);
        cursor = m.end() + consumed;
    }
    out.push_str(&source[cursor..]);
    (out, exports)
}

/// A script module's body, ready to go inside its registry function.
#[derive(Debug)]
struct LinkedScript {
    body: String,
    exports: Exports,
}

/// Rewrite the imports and exports of script module `id` whose transformed
/// text is `text`.
fn link_script(
    graph: &ModuleGraph,
    outputs: &HashMap<ModuleId, ModuleOutput>,
    placement: &Placement,
    id: ModuleId,
    text: &str,
) -> LinkedScript {
    let mut out = String::with_capacity(text.len());
    let mut reexports = Exports::default();
    let mut cursor = 0;

    for stmt in scan_imports(text) {
        if stmt.span.start < cursor {
            continue;
        }
        let Some(target) = graph.resolve_specifier(id, &stmt.specifier) else {
            continue;
        };
        let binding = binding_for(graph, outputs, placement, target);
        let Some(replacement) = rewrite(&stmt, &binding, &mut reexports) else {
            continue;
        };

        let original = &text[stmt.span.clone()];
        let indent_len = original.len() - original.trim_start().len();
        out.push_str(&text[cursor..stmt.span.start]);
        out.push_str(&original[..indent_len]);
        out.push_str(&pad_lines(replacement, original));
        cursor = stmt.span.end;
    }
    out.push_str(&text[cursor..]);

    let (body, mut exports) = collect_exports(&out);
    exports.named.extend(reexports.named);
    exports.stars.extend(reexports.stars);
    LinkedScript { body, exports }
}

/// Point the `url(...)` references of style module `id` at their emitted files.
fn link_style(graph: &ModuleGraph, placement: &Placement, id: ModuleId, css: &str) -> String {
    rewrite_urls(css, |raw| {
        let specifier = local_specifier(raw)?;
        let target = graph.resolve_specifier(id, &specifier)?;
        placement.file(target).map(public_url)
    })
}

/// Runtime snippet that injects `css` as a `<style>` element.
fn style_injection(css: &str) -> String {
    let literal = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(function () {{ var style = document.createElement(\"style\"); style.textContent = {literal}; document.head.appendChild(style); }})();\n"
    )
}

fn template_path(template: &str, ext: &str) -> String {
    render_template(
        template,
        &TemplateVars {
            name: BUNDLE_NAME,
            ext,
            path: "",
            content: None,
        },
    )
}

/// Assemble the bundles and file assets of the build from the transformed
/// modules, before plugins run.
#[must_use]
pub fn assemble(
    graph: &ModuleGraph,
    order: &[ModuleId],
    outputs: &HashMap<ModuleId, ModuleOutput>,
    config: &BuildConfig,
) -> Vec<Asset> {
    let placement = Placement::new(graph, outputs, config);

    let mut script = String::from(RUNTIME);
    let mut script_sources: Vec<PathBuf> = Vec::new();
    let mut registered: Vec<ModuleId> = Vec::new();
    let mut style = String::new();
    let mut style_sources: Vec<PathBuf> = Vec::new();
    let mut files = Vec::new();
    let mut map = config.source_maps.then(SourceMapBuilder::new);
    let mut line = RUNTIME.lines().count() as u32;

    for &id in order {
        let (Some(module), Some(output)) = (graph.get(id), outputs.get(&id)) else {
            continue;
        };
        let rel = config.relative(&module.path);

        if let Some(path) = placement.file(id) {
            let kind = match module.kind {
                ModuleKind::Font => AssetKind::Font,
                ModuleKind::Asset => AssetKind::Media,
                _ => AssetKind::from_path(path),
            };
            files.push(
                Asset::new(rel, path, kind, output.content.clone())
                    .with_sources(vec![module.path.clone()]),
            );
            continue;
        }

        let text = String::from_utf8_lossy(&output.content);
        match (&output.emit, module.kind) {
            (Emit::ExtractStyle, _) => {
                if !style.is_empty() && !style.ends_with('\n') {
                    style.push('\n');
                }
                style.push_str(&link_style(graph, &placement, id, &text));
                style_sources.push(module.path.clone());
            }
            (_, ModuleKind::Style) => {
                let css = link_style(graph, &placement, id, &text);
                script.push_str(&format!("// {rel}\n__brisk_modules[{id}] = function () {{\n"));
                script.push_str(&style_injection(&css));
                script.push_str("};\n");
                line += 4;
                registered.push(id);
                script_sources.push(module.path.clone());
            }
            _ if is_json(&module.path) => {}
            _ => {
                let linked = link_script(graph, outputs, &placement, id, &text);
                let registration = linked.exports.registration();
                let separator = if registration.is_empty() { "" } else { " " };
                script.push_str(&format!(
                    "// {rel}\n__brisk_modules[{id}] = function (module, exports) {{{separator}{registration}\n"
                ));
                line += 2;

                let lines = linked.body.lines().count() as u32;
                if let Some(map) = map.as_mut() {
                    let source = map.add_source(&rel, &module.text());
                    for i in 0..lines {
                        map.add_line_mapping(line + i, source, i);
                    }
                }
                line += lines;
                script.push_str(&linked.body);
                if !linked.body.is_empty() && !linked.body.ends_with('\n') {
                    script.push('\n');
                }
                script.push_str("};\n");
                line += 1;
                registered.push(id);
                script_sources.push(module.path.clone());
            }
        }
    }

    for entry in graph.entries() {
        if registered.contains(entry) {
            script.push_str(&format!("{};\n", require_call(*entry)));
        }
    }

    let mut assets = Vec::new();
    let script_path = template_path(&config.output.script, "js");

    if let Some(map) = map {
        let map_path = format!("{script_path}.map");
        let script_file = script_path.rsplit('/').next().unwrap_or(&script_path);
        script.push_str(&format!("//# sourceMappingURL={script_file}.map\n"));

        let mut js = Asset::new(SCRIPT_BUNDLE, script_path.clone(), AssetKind::Js, script.into_bytes())
            .with_sources(script_sources.clone());
        let map_name = format!("{SCRIPT_BUNDLE}.map");
        js.source_map = Some(map_name.clone());
        assets.push(js);
        assets.push(
            Asset::new(
                map_name,
                map_path,
                AssetKind::Map,
                map.generate(script_file).into_bytes(),
            )
            .with_sources(script_sources),
        );
    } else {
        assets.push(
            Asset::new(SCRIPT_BUNDLE, script_path, AssetKind::Js, script.into_bytes())
                .with_sources(script_sources),
        );
    }

    if !style_sources.is_empty() {
        assets.push(
            Asset::new(
                STYLE_BUNDLE,
                template_path(&config.output.style, "css"),
                AssetKind::Css,
                style.into_bytes(),
            )
            .with_sources(style_sources),
        );
    }

    assets.extend(files);
    assets
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
