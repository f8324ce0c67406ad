//! Asset bundler.
//!
//! Turns the module graph reachable from the configured entries into
//! deployable assets.
//!
//! ## Usage
//!
//! ```ignore
//! use brisk_core::bundler::{emit, Bundler};
//!
//! let bundler = Bundler::new(config.clone())?;
//! let output = bundler.build()?;
//! emit(&output, &config.output_root)?;
//! ```
//!
//! ## Architecture
//!
//! 1. **Resolution** - Resolve import specifiers to canonical paths
//! 2. **Graph** - Build the module graph from the entries
//! 3. **Transform** - Run each module's loader chain (in parallel)
//! 4. **Assemble** - Script bundle, style bundle and file assets
//! 5. **Plugins** - Lifecycle hooks over the assets and manifest
//! 6. **Emit** - Write everything to the output root

mod assemble;
pub mod assets;
mod emit;
pub mod graph;
pub mod imports;
pub mod loader;
pub mod manifest;
pub mod plugin;
pub mod plugins;
pub mod resolve;
pub mod sourcemap;
pub mod transform;

pub use assemble::{SCRIPT_BUNDLE, STYLE_BUNDLE};
pub use assets::{Asset, AssetKind};
pub use emit::{emit, EmitSummary};
pub use graph::{Module, ModuleGraph, ModuleId, ModuleKind};
pub use loader::{LoaderDispatcher, LoaderRule, StageSpec};
pub use manifest::{Manifest, MANIFEST_FILE};
pub use plugin::{
    Diagnostic, HookResult, Plugin, PluginContainer, PluginContext, PluginOutput, Severity,
};
pub use resolve::Resolver;
pub use transform::{
    Emit, ModuleOutput, StageOptions, Transform, TransformContext, TransformFailure,
    TransformRegistry,
};

use rayon::prelude::*;
use rustc_hash::FxHashMap as HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::BuildConfig;
use crate::error::{BuildError, ConfigError, TransformError};

/// Result of one successful build.
#[derive(Debug)]
pub struct BuildOutput {
    /// Every asset to emit, in emission order.
    pub assets: Vec<Asset>,
    pub manifest: Manifest,
    pub diagnostics: Vec<Diagnostic>,
    /// Canonical module paths, dependency-first.
    pub modules: Vec<PathBuf>,
    pub graph: ModuleGraph,
}

impl BuildOutput {
    /// Asset by logical name.
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// The build pipeline for one configuration.
pub struct Bundler {
    config: Arc<BuildConfig>,
    registry: TransformRegistry,
    dispatcher: LoaderDispatcher,
    plugins: PluginContainer,
}

impl std::fmt::Debug for Bundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("mode", &self.config.mode)
            .field("registry", &self.registry)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl Bundler {
    /// A bundler with the built-in stages and the plugins named in `config`.
    pub fn new(config: Arc<BuildConfig>) -> Result<Self, ConfigError> {
        Self::with_registry(config, TransformRegistry::builtin())
    }

    /// A bundler that runs stages from `registry`. Every stage a loader rule
    /// names must be registered in it.
    pub fn with_registry(
        config: Arc<BuildConfig>,
        registry: TransformRegistry,
    ) -> Result<Self, ConfigError> {
        let dispatcher = LoaderDispatcher::new(&config.loader_rules)?;
        dispatcher.check_stages(&registry)?;
        let plugins = plugins::container_for(&config.plugins)?;
        Ok(Self {
            config,
            registry,
            dispatcher,
            plugins,
        })
    }

    /// Append a plugin after the configured ones.
    pub fn plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.add(plugin);
        self
    }

    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run one complete build. Nothing is written to disk.
    pub fn build(&self) -> Result<BuildOutput, BuildError> {
        let started = Instant::now();
        let config = self.config.as_ref();
        tracing::info!(mode = %config.mode, entries = ?config.entries, "build started");

        let resolver = Resolver::new(config);
        let graph = ModuleGraph::build(config, &resolver)?;
        let order = graph.toposort();

        let outputs = self.transform_all(&graph, &order)?;
        let assets = assemble::assemble(&graph, &order, &outputs, config);

        let mut manifest = Manifest::new();
        for asset in &assets {
            manifest.insert(asset.name.clone(), asset.output_path.clone());
        }

        let mut out = self.plugins.run(config, assets, manifest)?;
        out.assets = dedupe_outputs(out.assets)?;

        let modules = order
            .iter()
            .filter_map(|&id| graph.get(id).map(|m| m.path.clone()))
            .collect();

        tracing::info!(
            modules = graph.len(),
            assets = out.assets.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );

        Ok(BuildOutput {
            assets: out.assets,
            manifest: out.manifest,
            diagnostics: out.diagnostics,
            modules,
            graph,
        })
    }

    /// Run every module's chain in parallel. Every failure is logged and
    /// recorded as an error diagnostic; the error names the first in module
    /// order.
    fn transform_all(
        &self,
        graph: &ModuleGraph,
        order: &[ModuleId],
    ) -> Result<HashMap<ModuleId, ModuleOutput>, BuildError> {
        let ctx = TransformContext {
            config: &self.config,
        };

        let results: Vec<(ModuleId, Result<ModuleOutput, TransformError>)> = order
            .par_iter()
            .filter_map(|&id| graph.get(id))
            .map(|module| {
                (
                    module.id,
                    self.dispatcher.run(module, &self.registry, &ctx),
                )
            })
            .collect();

        let mut outputs = HashMap::default();
        let mut failures: Vec<TransformError> = Vec::new();
        for (id, result) in results {
            match result {
                Ok(output) => {
                    outputs.insert(id, output);
                }
                Err(e) => {
                    tracing::error!(stage = %e.stage, path = %e.path, "{}", e.cause);
                    failures.push(e);
                }
            }
        }

        let diagnostics = failures.iter().map(TransformError::to_diagnostic).collect();
        match failures.into_iter().next() {
            Some(error) => Err(BuildError::Transform { error, diagnostics }),
            None => Ok(outputs),
        }
    }
}

/// Drop assets that repeat an earlier asset's path and bytes. Every
/// placeholder must be resolved and no two assets may write different bytes
/// to the same path.
fn dedupe_outputs(assets: Vec<Asset>) -> Result<Vec<Asset>, BuildError> {
    let mut kept: Vec<Asset> = Vec::with_capacity(assets.len());
    let mut index: HashMap<String, usize> = HashMap::default();

    for asset in assets {
        if assets::has_hash_placeholder(&asset.output_path) {
            return Err(BuildError::Internal(format!(
                "output path '{}' of '{}' still contains a content hash placeholder",
                asset.output_path, asset.name
            )));
        }
        if let Some(&i) = index.get(&asset.output_path) {
            let previous = &kept[i];
            if previous.content != asset.content {
                return Err(BuildError::Internal(format!(
                    "conflict: '{}' and '{}' emit different content to '{}'",
                    previous.name, asset.name, asset.output_path
                )));
            }
            tracing::debug!(path = %asset.output_path, "duplicate output dropped");
            continue;
        }
        index.insert(asset.output_path.clone(), kept.len());
        kept.push(asset);
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::test_util::fixture;

    fn build(files: &[(&str, &str)], mode: Mode) -> (tempfile::TempDir, BuildOutput) {
        let (dir, config) = fixture(files, mode);
        let output = Bundler::new(Arc::new(config)).unwrap().build().unwrap();
        (dir, output)
    }

    #[test]
    fn test_development_build() {
        let (_dir, out) = build(
            &[
                (
                    "src/index.tsx",
                    "import './app.css';\nimport logo from './logo.png';\nimport { greet } from './greet';\ngreet(logo);\n",
                ),
                ("src/greet.ts", "export function greet(x) {\n  console.log(x);\n}\n"),
                ("src/app.css", ".app { color: red; }\n"),
                ("src/logo.png", "PNG"),
            ],
            Mode::Development,
        );

        let js = out.asset(SCRIPT_BUNDLE).unwrap();
        assert_eq!(js.output_path, "static/js/main.js");
        let text = js.text();
        assert!(text.contains("const logo = \"/static/media/src/logo.png\";"));
        assert!(text.contains("function greet(x)"));
        assert!(!text.contains("export function"));
        assert!(text.find("function greet").unwrap() < text.find("greet(logo)").unwrap());
        assert!(text.ends_with("//# sourceMappingURL=main.js.map\n"));

        assert_eq!(out.manifest.get("main.css"), Some("static/css/main.css"));
        assert_eq!(out.manifest.get("main.js.map"), Some("static/js/main.js.map"));
        assert_eq!(out.manifest.get("src/logo.png"), Some("static/media/src/logo.png"));
        assert_eq!(out.manifest.get("index.html"), Some("index.html"));

        let html = out.asset("index.html").unwrap().text();
        assert!(html.contains("/__brisk/client.js"));
        assert_eq!(out.modules.len(), 4);
    }

    #[test]
    fn test_style_injected_without_extract_rule() {
        let (_dir, mut config) = fixture(
            &[
                ("src/index.tsx", "import './a.css';\n"),
                ("src/a.css", "a { color: blue; }\n"),
            ],
            Mode::Development,
        );
        for rule in &mut config.loader_rules {
            rule.stages.retain(|s| s.loader != "extract-css");
        }
        let out = Bundler::new(Arc::new(config)).unwrap().build().unwrap();

        assert!(out.asset(STYLE_BUNDLE).is_none());
        let js = out.asset(SCRIPT_BUNDLE).unwrap().text();
        assert!(js.contains("document.createElement(\"style\")"));
        assert!(js.contains("color: blue"));
    }

    #[test]
    fn test_json_import_inlined() {
        let (_dir, out) = build(
            &[
                ("src/index.tsx", "import data from './data.json';\nconsole.log(data.a);\n"),
                ("src/data.json", "{ \"a\": 1 }\n"),
            ],
            Mode::Development,
        );
        let js = out.asset(SCRIPT_BUNDLE).unwrap().text();
        assert!(js.contains("const data = { \"a\": 1 };"));
        assert!(!js.contains("// src/data.json"));
    }

    #[test]
    fn test_transform_failure_fails_build() {
        let (_dir, config) = fixture(
            &[
                ("src/index.tsx", "import './broken.scss';\n"),
                ("src/broken.scss", "a { color: $undefined; }\n"),
            ],
            Mode::Development,
        );
        let err = Bundler::new(Arc::new(config)).unwrap().build().unwrap_err();
        match err {
            BuildError::Transform { error, diagnostics } => {
                assert_eq!(error.stage, "sass");
                assert!(error.path.ends_with("broken.scss"));
                assert_eq!(diagnostics, vec![error.to_diagnostic()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_every_transform_failure_is_a_diagnostic() {
        let (_dir, config) = fixture(
            &[
                ("src/index.tsx", "import './first.scss';\nimport './second.scss';\n"),
                ("src/first.scss", "a { color: $nope; }\n"),
                ("src/second.scss", "b { color: $missing; }\n"),
            ],
            Mode::Development,
        );
        let err = Bundler::new(Arc::new(config)).unwrap().build().unwrap_err();

        assert_eq!(err.code(), "BUILD_TRANSFORM_ERROR");
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Error && d.source == "sass"));
        assert!(diagnostics[0].message.contains("first.scss"));
        assert!(diagnostics[1].message.contains("second.scss"));
        assert_eq!(err.to_string(), diagnostics[0].message);
    }

    /// Puts a banner comment above each script.
    struct Banner;

    impl Transform for Banner {
        fn apply(
            &self,
            mut input: ModuleOutput,
            _path: &std::path::Path,
            _options: &StageOptions,
            _ctx: &TransformContext<'_>,
        ) -> Result<ModuleOutput, TransformFailure> {
            let mut content = b"// banner\n".to_vec();
            content.append(&mut input.content);
            input.content = content;
            Ok(input)
        }
    }

    #[test]
    fn test_rule_stages_checked_against_registry() {
        let (_dir, mut config) = fixture(
            &[("src/index.tsx", "console.log('hi');\n")],
            Mode::Development,
        );
        config.loader_rules[0].stages = vec![StageSpec::new("banner")];
        let config = Arc::new(config);

        let err = Bundler::new(Arc::clone(&config)).unwrap_err();
        assert!(err.message.contains("unknown stage 'banner'"), "{}", err.message);

        let mut registry = TransformRegistry::builtin();
        registry.register("banner", Banner);
        let out = Bundler::with_registry(config, registry).unwrap().build().unwrap();
        let js = out.asset(SCRIPT_BUNDLE).unwrap().text();
        assert!(js.contains("// banner\nconsole.log('hi');"));
    }

    #[test]
    fn test_dedupe_outputs() {
        let a = Asset::new("a.png", "static/media/x.png", AssetKind::Media, b"1".to_vec());
        let b = Asset::new("b.png", "static/media/x.png", AssetKind::Media, b"2".to_vec());
        assert_eq!(dedupe_outputs(vec![a.clone(), a.clone()]).unwrap().len(), 1);
        assert!(dedupe_outputs(vec![a, b]).is_err());

        let pending = Asset::new("main.js", "main.[contenthash].js", AssetKind::Js, Vec::new());
        assert!(dedupe_outputs(vec![pending]).is_err());
    }
}
