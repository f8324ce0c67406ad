//! Mode controller.
//!
//! [`assemble_pipeline`] turns a build mode and a set of stage toggles into a
//! declarative [`PipelineDescription`]: the loader rule table, the ordered
//! plugin list, and the output naming templates. It is pure, so two calls with
//! the same inputs return equal descriptions.
//!
//! ## Production plugin order
//!
//! ```text
//! Env, Copy, Progress, Minify?, ContentHash?, Html, Compression?, BundleAnalyzer?
//! ```
//!
//! ## Development plugin order
//!
//! ```text
//! Env, Copy, Html { live_reload: true }
//! ```

use serde::Serialize;

use crate::bundler::loader::{LoaderRule, StageSpec};
use crate::config::{Mode, OutputTemplates};

/// Independent toggles for the optional production stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineFlags {
    /// Emit `report.json`.
    pub analyze: bool,
    pub minify: bool,
    /// Content-hash output names.
    pub hash: bool,
    /// Emit compressed siblings.
    pub compress: bool,
}

impl Default for PipelineFlags {
    fn default() -> Self {
        Self {
            analyze: false,
            minify: true,
            hash: true,
            compress: true,
        }
    }
}

/// Compression algorithm for the compression stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    #[default]
    Brotli,
    Gzip,
}

impl CompressionAlgorithm {
    /// File suffix appended to the original output path.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Brotli => ".br",
            Self::Gzip => ".gz",
        }
    }
}

/// A plugin stage, as an explicit variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "plugin", rename_all = "kebab-case")]
pub enum PluginSpec {
    Env,
    Copy,
    Html { live_reload: bool },
    Progress,
    Minify,
    ContentHash,
    Compression {
        algorithm: CompressionAlgorithm,
        test: String,
    },
    BundleAnalyzer,
}

impl PluginSpec {
    /// Name used in logs and in [`crate::error::PluginError`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::Copy => "copy",
            Self::Html { .. } => "html",
            Self::Progress => "progress",
            Self::Minify => "minify",
            Self::ContentHash => "content-hash",
            Self::Compression { .. } => "compression",
            Self::BundleAnalyzer => "bundle-analyzer",
        }
    }
}

/// Everything the mode decides, before it is combined with the project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDescription {
    pub mode: Mode,
    pub loader_rules: Vec<LoaderRule>,
    pub plugins: Vec<PluginSpec>,
    pub dev_server_enabled: bool,
    pub source_maps: bool,
    pub output: OutputTemplates,
}

/// Build the pipeline description for `mode`.
///
/// `flags` only affects production; development always runs without minification,
/// hashing, compression or analysis.
#[must_use]
pub fn assemble_pipeline(mode: Mode, flags: &PipelineFlags) -> PipelineDescription {
    match mode {
        Mode::Development => {
            let output = stable_templates();
            PipelineDescription {
                mode,
                loader_rules: default_rules(&output),
                plugins: vec![
                    PluginSpec::Env,
                    PluginSpec::Copy,
                    PluginSpec::Html { live_reload: true },
                ],
                dev_server_enabled: true,
                source_maps: true,
                output,
            }
        }
        Mode::Production => {
            let output = if flags.hash {
                hashed_templates()
            } else {
                stable_templates()
            };

            let mut plugins = vec![PluginSpec::Env, PluginSpec::Copy, PluginSpec::Progress];
            if flags.minify {
                plugins.push(PluginSpec::Minify);
            }
            if flags.hash {
                plugins.push(PluginSpec::ContentHash);
            }
            plugins.push(PluginSpec::Html { live_reload: false });
            if flags.compress {
                plugins.push(PluginSpec::Compression {
                    algorithm: CompressionAlgorithm::default(),
                    test: r"\.(css|js)$".to_string(),
                });
            }
            if flags.analyze {
                plugins.push(PluginSpec::BundleAnalyzer);
            }

            PipelineDescription {
                mode,
                loader_rules: default_rules(&output),
                plugins,
                dev_server_enabled: false,
                source_maps: false,
                output,
            }
        }
    }
}

/// Unhashed names. Files keep their source directory so equal basenames in
/// different folders do not collide.
fn stable_templates() -> OutputTemplates {
    OutputTemplates {
        script: "static/js/[name].js".to_string(),
        style: "static/css/[name].css".to_string(),
        media: "static/media/[path][name].[ext]".to_string(),
        font: "static/fonts/[path][name].[ext]".to_string(),
    }
}

fn hashed_templates() -> OutputTemplates {
    OutputTemplates {
        script: "static/js/[name].[contenthash:6].js".to_string(),
        style: "static/css/[name].[contenthash:6].css".to_string(),
        media: "static/media/[name].[contenthash:6].[ext]".to_string(),
        font: "static/fonts/[name].[ext]".to_string(),
    }
}

fn default_rules(output: &OutputTemplates) -> Vec<LoaderRule> {
    vec![
        LoaderRule::new(r"\.tsx?$")
            .exclude("node_modules")
            .stage(StageSpec::new("script")),
        LoaderRule::new(r"\.(s[ac]ss|css)$")
            .stage(StageSpec::new("extract-css"))
            .stage(StageSpec::new("css"))
            .stage(StageSpec::new("sass")),
        LoaderRule::new(r"\.(png|svg|jpg|gif)$")
            .stage(StageSpec::new("file").option("name", &output.media)),
        LoaderRule::new(r"\.(eot|ttf|woff|woff2)$")
            .stage(StageSpec::new("file").option("name", &output.font)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(desc: &PipelineDescription) -> Vec<&'static str> {
        desc.plugins.iter().map(PluginSpec::name).collect()
    }

    #[test]
    fn test_development_pipeline() {
        let desc = assemble_pipeline(Mode::Development, &PipelineFlags::default());
        assert_eq!(names(&desc), vec!["env", "copy", "html"]);
        assert!(desc.plugins.contains(&PluginSpec::Html { live_reload: true }));
        assert!(desc.dev_server_enabled);
        assert!(desc.source_maps);
        assert_eq!(desc.output.script, "static/js/[name].js");
        assert_eq!(desc.output.media, "static/media/[path][name].[ext]");
        assert_eq!(desc.output.font, "static/fonts/[path][name].[ext]");
    }

    #[test]
    fn test_production_pipeline_order() {
        let desc = assemble_pipeline(
            Mode::Production,
            &PipelineFlags {
                analyze: true,
                ..PipelineFlags::default()
            },
        );
        assert_eq!(
            names(&desc),
            vec![
                "env",
                "copy",
                "progress",
                "minify",
                "content-hash",
                "html",
                "compression",
                "bundle-analyzer"
            ]
        );
        assert!(!desc.dev_server_enabled);
        assert!(!desc.source_maps);
        assert_eq!(desc.output.script, "static/js/[name].[contenthash:6].js");
        assert_eq!(desc.output.font, "static/fonts/[name].[ext]");
    }

    #[test]
    fn test_analyzer_only_when_requested() {
        let desc = assemble_pipeline(Mode::Production, &PipelineFlags::default());
        assert!(!desc.plugins.contains(&PluginSpec::BundleAnalyzer));
    }

    #[test]
    fn test_stages_independently_skippable() {
        let desc = assemble_pipeline(
            Mode::Production,
            &PipelineFlags {
                analyze: false,
                minify: false,
                hash: false,
                compress: false,
            },
        );
        assert_eq!(names(&desc), vec!["env", "copy", "progress", "html"]);
        assert_eq!(desc.output.media, "static/media/[path][name].[ext]");
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let flags = PipelineFlags::default();
        assert_eq!(
            assemble_pipeline(Mode::Production, &flags),
            assemble_pipeline(Mode::Production, &flags)
        );
    }

    #[test]
    fn test_default_rule_table() {
        let desc = assemble_pipeline(Mode::Production, &PipelineFlags::default());
        let styles = &desc.loader_rules[1];
        let stages: Vec<_> = styles.stages.iter().map(|s| s.loader.as_str()).collect();
        assert_eq!(stages, vec!["extract-css", "css", "sass"]);
        assert_eq!(desc.loader_rules[0].exclude.as_deref(), Some("node_modules"));
        assert_eq!(
            desc.loader_rules[2].stages[0].options.get("name").map(String::as_str),
            Some("static/media/[name].[contenthash:6].[ext]")
        );
    }
}
