//! Plugin system for the build pipeline.
//!
//! Plugins observe and mutate a build at three lifecycle points, always in
//! declaration order:
//!
//! 1. `on_init(config)` once, before any asset exists
//! 2. `on_asset(ctx, asset)` for every asset, in emission order; assets a
//!    plugin emits are queued and go through `on_asset` as well
//! 3. `on_done(ctx)` once; assets emitted here also pass through `on_asset`
//!
//! Plugins share state only through the [`PluginContext`] of the build.
//!
//! ## Example
//!
//! ```ignore
//! use brisk_core::bundler::{Asset, HookResult, Plugin, PluginContext};
//!
//! struct Banner;
//!
//! impl Plugin for Banner {
//!     fn name(&self) -> &str { "banner" }
//!
//!     fn on_asset(&self, _ctx: &mut PluginContext<'_>, asset: &mut Asset) -> HookResult {
//!         if asset.output_path.ends_with(".js") {
//!             asset.content.splice(0..0, b"/* built with brisk */\n".iter().copied());
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use rustc_hash::FxHashMap as HashMap;
use serde::Serialize;
use std::collections::VecDeque;

use super::assets::Asset;
use super::manifest::Manifest;
use crate::config::BuildConfig;
use crate::error::PluginError;

/// Result type for plugin hooks. The container attaches plugin and hook names.
pub type HookResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A message attached to the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Plugin or stage that raised it.
    pub source: String,
    pub message: String,
}

/// Mutable state for one build.
#[derive(Debug)]
pub struct PluginContext<'a> {
    config: &'a BuildConfig,
    /// Assets that completed `on_asset`, in emission order.
    pub assets: Vec<Asset>,
    pub manifest: Manifest,
    diagnostics: Vec<Diagnostic>,
    pending: Vec<Asset>,
    meta: HashMap<String, String>,
}

impl<'a> PluginContext<'a> {
    /// A fresh context.
    #[must_use]
    pub fn new(config: &'a BuildConfig, manifest: Manifest) -> Self {
        Self {
            config,
            assets: Vec::new(),
            manifest,
            diagnostics: Vec::new(),
            pending: Vec::new(),
            meta: HashMap::default(),
        }
    }

    /// Read-only build configuration, including the environment map.
    #[must_use]
    pub fn config(&self) -> &'a BuildConfig {
        self.config
    }

    /// Queue a new asset. It goes through `on_asset` before joining `assets`.
    pub fn emit_asset(&mut self, asset: Asset) {
        self.pending.push(asset);
    }

    pub fn warn(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.push_diagnostic(Severity::Warning, source, message);
    }

    pub fn error(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.push_diagnostic(Severity::Error, source, message);
    }

    fn push_diagnostic(
        &mut self,
        severity: Severity,
        source: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            severity,
            source: source.into(),
            message: message.into(),
        };
        tracing::warn!(source = %diagnostic.source, severity = ?severity, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Set a metadata value (for inter-plugin communication).
    pub fn set_meta(&mut self, key: &str, value: String) {
        self.meta.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn get_meta(&self, key: &str) -> Option<&String> {
        self.meta.get(key)
    }

    /// Asset by logical name.
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    fn take_pending(&mut self) -> Vec<Asset> {
        std::mem::take(&mut self.pending)
    }
}

/// A build plugin.
pub trait Plugin: Send + Sync {
    /// Plugin name for logs and error messages.
    fn name(&self) -> &str;

    /// Called once before the first asset is produced.
    fn on_init(&self, _config: &BuildConfig) -> HookResult {
        Ok(())
    }

    /// Called for every asset, in emission order.
    fn on_asset(&self, _ctx: &mut PluginContext<'_>, _asset: &mut Asset) -> HookResult {
        Ok(())
    }

    /// Called once after every asset went through `on_asset`.
    fn on_done(&self, _ctx: &mut PluginContext<'_>) -> HookResult {
        Ok(())
    }
}

/// What the plugin pipeline hands back.
#[derive(Debug)]
pub struct PluginOutput {
    pub assets: Vec<Asset>,
    pub manifest: Manifest,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs plugins in declaration order.
#[derive(Default)]
pub struct PluginContainer {
    plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContainer")
            .field("plugins", &self.names())
            .finish()
    }
}

impl PluginContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin.
    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run the whole lifecycle over `assets` with a fresh context.
    pub fn run(
        &self,
        config: &BuildConfig,
        assets: Vec<Asset>,
        manifest: Manifest,
    ) -> Result<PluginOutput, PluginError> {
        for plugin in &self.plugins {
            plugin
                .on_init(config)
                .map_err(|e| hook_error(plugin.as_ref(), "on_init", &*e))?;
        }

        let mut ctx = PluginContext::new(config, manifest);
        self.process(&mut ctx, assets)?;

        for plugin in &self.plugins {
            plugin
                .on_done(&mut ctx)
                .map_err(|e| hook_error(plugin.as_ref(), "on_done", &*e))?;
            let emitted = ctx.take_pending();
            self.process(&mut ctx, emitted)?;
        }

        Ok(PluginOutput {
            assets: ctx.assets,
            manifest: ctx.manifest,
            diagnostics: ctx.diagnostics,
        })
    }

    /// Push `assets` (and anything emitted along the way) through `on_asset`.
    fn process(&self, ctx: &mut PluginContext<'_>, assets: Vec<Asset>) -> Result<(), PluginError> {
        let mut queue: VecDeque<Asset> = assets.into();

        while let Some(mut asset) = queue.pop_front() {
            for plugin in &self.plugins {
                plugin
                    .on_asset(ctx, &mut asset)
                    .map_err(|e| hook_error(plugin.as_ref(), "on_asset", &*e))?;
            }
            ctx.assets.push(asset);
            queue.extend(ctx.take_pending());
        }

        Ok(())
    }
}

fn hook_error(
    plugin: &dyn Plugin,
    hook: &'static str,
    cause: &(dyn std::error::Error + Send + Sync),
) -> PluginError {
    PluginError {
        plugin: plugin.name().to_string(),
        hook,
        cause: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::assets::AssetKind;
    use crate::config::{Mode, ProjectConfig};
    use crate::pipeline::{assemble_pipeline, PipelineFlags};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn config() -> (tempfile::TempDir, BuildConfig) {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.tsx"), "").unwrap();
        let config = BuildConfig::from_project(
            &ProjectConfig {
                root: dir.path().to_path_buf(),
                ..ProjectConfig::default()
            },
            assemble_pipeline(Mode::Development, &PipelineFlags::default()),
            BTreeMap::new(),
        )
        .unwrap();
        (dir, config)
    }

    fn js(name: &str) -> Asset {
        Asset::new(name, format!("static/js/{name}"), AssetKind::Js, b"x".to_vec())
    }

    /// Records every hook call as "plugin:hook:asset".
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        emit_on_done: bool,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn on_init(&self, _config: &BuildConfig) -> HookResult {
            self.log.lock().unwrap().push(format!("{}:init", self.name));
            Ok(())
        }

        fn on_asset(&self, _ctx: &mut PluginContext<'_>, asset: &mut Asset) -> HookResult {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:asset:{}", self.name, asset.name));
            Ok(())
        }

        fn on_done(&self, ctx: &mut PluginContext<'_>) -> HookResult {
            self.log.lock().unwrap().push(format!("{}:done", self.name));
            if self.emit_on_done {
                ctx.emit_asset(js("late.js"));
            }
            Ok(())
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_asset(&self, _ctx: &mut PluginContext<'_>, _asset: &mut Asset) -> HookResult {
            Err("cannot handle asset".into())
        }
    }

    struct Splitter;

    impl Plugin for Splitter {
        fn name(&self) -> &str {
            "splitter"
        }

        fn on_asset(&self, ctx: &mut PluginContext<'_>, asset: &mut Asset) -> HookResult {
            if asset.name == "main.js" {
                ctx.emit_asset(js("extra.js"));
                ctx.set_meta("split", "yes".to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn test_hooks_run_in_declaration_order() {
        let (_dir, config) = config();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut container = PluginContainer::new();
        for (name, emit_on_done) in [("a", true), ("b", false)] {
            container.add(Box::new(Recorder {
                name,
                log: log.clone(),
                emit_on_done,
            }));
        }

        let out = container
            .run(&config, vec![js("main.js")], Manifest::new())
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:init",
                "b:init",
                "a:asset:main.js",
                "b:asset:main.js",
                "a:done",
                "a:asset:late.js",
                "b:asset:late.js",
                "b:done",
            ]
        );
        let names: Vec<_> = out.assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["main.js", "late.js"]);
    }

    #[test]
    fn test_emitted_assets_pass_through_on_asset() {
        let (_dir, config) = config();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut container = PluginContainer::new();
        container.add(Box::new(Splitter));
        container.add(Box::new(Recorder {
            name: "r",
            log: log.clone(),
            emit_on_done: false,
        }));

        let out = container
            .run(&config, vec![js("main.js")], Manifest::new())
            .unwrap();

        assert!(log.lock().unwrap().contains(&"r:asset:extra.js".to_string()));
        assert_eq!(out.assets.len(), 2);
    }

    #[test]
    fn test_hook_error_names_plugin_and_hook() {
        let (_dir, config) = config();
        let mut container = PluginContainer::new();
        container.add(Box::new(Failing));

        let err = container
            .run(&config, vec![js("main.js")], Manifest::new())
            .unwrap_err();
        assert_eq!(err.plugin, "failing");
        assert_eq!(err.hook, "on_asset");
        assert_eq!(err.cause, "cannot handle asset");
    }

    #[test]
    fn test_context_diagnostics_and_meta() {
        let (_dir, config) = config();
        let mut ctx = PluginContext::new(&config, Manifest::new());
        ctx.warn("copy", "public dir missing");
        ctx.set_meta("k", "v".to_string());

        assert_eq!(ctx.diagnostics()[0].severity, Severity::Warning);
        assert_eq!(ctx.get_meta("k").map(String::as_str), Some("v"));
        assert_eq!(ctx.config().mode, Mode::Development);
    }
}
