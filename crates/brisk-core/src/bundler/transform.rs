//! Transform stages.
//!
//! A stage takes a module's current output and returns a new one. Stages are
//! registered by name in a [`TransformRegistry`]; loader rules refer to them by
//! that name. The built-in stages are:
//!
//! | Name          | Effect |
//! |---------------|--------|
//! | `script`      | strips a UTF-8 BOM, normalizes line endings |
//! | `sass`        | compiles `.scss`/`.sass` with grass; other files pass through |
//! | `css`         | parses and re-prints with lightningcss |
//! | `extract-css` | routes the module into the extracted style bundle |
//! | `file`        | emits the module as a standalone file named by the `name` template |

use rustc_hash::FxHashMap as HashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::assets::{render_template, TemplateVars};
use crate::config::BuildConfig;
use crate::css::sass::{compile_sass, is_sass_file};
use crate::css::{process_css, CssOptions};

/// Options attached to a stage in a loader rule.
pub type StageOptions = BTreeMap<String, String>;

/// Error returned by a stage; wrapped into a `TransformError` by the dispatcher.
pub type TransformFailure = Box<dyn std::error::Error + Send + Sync>;

/// Where a module's output ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit {
    /// Part of the script bundle (styles are injected at runtime).
    Inline,
    /// Part of the extracted style bundle.
    ExtractStyle,
    /// A standalone file at the given output path.
    File { name: String },
}

/// A module's content as it moves through its chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutput {
    pub content: Vec<u8>,
    pub emit: Emit,
}

impl ModuleOutput {
    #[must_use]
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            emit: Emit::Inline,
        }
    }
}

/// Read-only inputs available to every stage.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub config: &'a BuildConfig,
}

/// A named, pluggable transform stage.
pub trait Transform: Send + Sync {
    fn apply(
        &self,
        input: ModuleOutput,
        path: &Path,
        options: &StageOptions,
        ctx: &TransformContext<'_>,
    ) -> Result<ModuleOutput, TransformFailure>;
}

/// Stage lookup by name.
#[derive(Clone)]
pub struct TransformRegistry {
    stages: HashMap<String, Arc<dyn Transform>>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.stages.keys().collect();
        names.sort();
        f.debug_struct("TransformRegistry")
            .field("stages", &names)
            .finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TransformRegistry {
    /// Registry with the built-in stages.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self {
            stages: HashMap::default(),
        };
        registry.register("script", ScriptStage);
        registry.register("sass", SassStage);
        registry.register("css", CssStage);
        registry.register("extract-css", ExtractCssStage);
        registry.register("file", FileStage);
        registry
    }

    /// Register (or replace) a stage.
    pub fn register(&mut self, name: impl Into<String>, stage: impl Transform + 'static) {
        self.stages.insert(name.into(), Arc::new(stage));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Transform> {
        self.stages.get(name).map(Arc::as_ref)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }
}

fn into_text(content: Vec<u8>) -> Result<String, TransformFailure> {
    String::from_utf8(content).map_err(|_| "content is not valid UTF-8".into())
}

struct ScriptStage;

impl Transform for ScriptStage {
    fn apply(
        &self,
        input: ModuleOutput,
        _path: &Path,
        _options: &StageOptions,
        _ctx: &TransformContext<'_>,
    ) -> Result<ModuleOutput, TransformFailure> {
        let text = into_text(input.content)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let normalized = text.replace("\r\n", "\n");
        Ok(ModuleOutput {
            content: normalized.into_bytes(),
            emit: input.emit,
        })
    }
}

struct SassStage;

impl Transform for SassStage {
    fn apply(
        &self,
        input: ModuleOutput,
        path: &Path,
        _options: &StageOptions,
        _ctx: &TransformContext<'_>,
    ) -> Result<ModuleOutput, TransformFailure> {
        if !is_sass_file(path) {
            return Ok(input);
        }
        let source = into_text(input.content)?;
        let css = compile_sass(&source, path)?;
        Ok(ModuleOutput {
            content: css.into_bytes(),
            emit: input.emit,
        })
    }
}

struct CssStage;

impl Transform for CssStage {
    fn apply(
        &self,
        input: ModuleOutput,
        path: &Path,
        _options: &StageOptions,
        _ctx: &TransformContext<'_>,
    ) -> Result<ModuleOutput, TransformFailure> {
        let source = into_text(input.content)?;
        let css = process_css(
            &source,
            &CssOptions {
                minify: false,
                filename: Some(path.display().to_string()),
            },
        )?;
        Ok(ModuleOutput {
            content: css.into_bytes(),
            emit: input.emit,
        })
    }
}

struct ExtractCssStage;

impl Transform for ExtractCssStage {
    fn apply(
        &self,
        input: ModuleOutput,
        _path: &Path,
        _options: &StageOptions,
        _ctx: &TransformContext<'_>,
    ) -> Result<ModuleOutput, TransformFailure> {
        Ok(ModuleOutput {
            content: input.content,
            emit: Emit::ExtractStyle,
        })
    }
}

struct FileStage;

impl Transform for FileStage {
    fn apply(
        &self,
        input: ModuleOutput,
        path: &Path,
        options: &StageOptions,
        ctx: &TransformContext<'_>,
    ) -> Result<ModuleOutput, TransformFailure> {
        let template = options.get("name").map_or("[name].[ext]", String::as_str);
        let name = file_name(template, path, &input.content, ctx.config);
        Ok(ModuleOutput {
            content: input.content,
            emit: Emit::File { name },
        })
    }
}

/// Render a file template for the module at `path`.
#[must_use]
pub fn file_name(template: &str, path: &Path, content: &[u8], config: &BuildConfig) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let dir = path
        .parent()
        .map(|p| config.relative(p))
        .filter(|d| !d.is_empty())
        .map(|d| format!("{d}/"))
        .unwrap_or_default();

    render_template(
        template,
        &TemplateVars {
            name: stem,
            ext,
            path: &dir,
            content: Some(content),
        },
    )
}
