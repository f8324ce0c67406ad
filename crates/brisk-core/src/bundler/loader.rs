//! Loader dispatcher.
//!
//! Maps a module path to its transform chain using an ordered rule table.
//! The first rule whose `test` matches (and whose `exclude` does not) wins;
//! rules are never merged. A path that matches nothing gets an empty chain and
//! its content passes through untouched.
//!
//! Stages are declared the way they read in a rule (`[extract-css, css, sass]`)
//! and executed in reverse: `sass` first, `extract-css` last.

use regex_lite::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::graph::Module;
use super::transform::{ModuleOutput, TransformContext, TransformRegistry};
use crate::error::{ConfigError, TransformError};

/// One stage reference in a rule, with its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSpec {
    pub loader: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl StageSpec {
    #[must_use]
    pub fn new(loader: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A loader rule: path pattern, optional exclusion, declared stage chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoaderRule {
    pub test: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    #[serde(rename = "use")]
    pub stages: Vec<StageSpec>,
}

impl LoaderRule {
    #[must_use]
    pub fn new(test: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            exclude: None,
            stages: Vec::new(),
        }
    }

    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }
}

#[derive(Debug)]
struct CompiledRule {
    test: Regex,
    exclude: Option<Regex>,
    stages: Vec<StageSpec>,
}

/// Compiled rule table.
#[derive(Debug)]
pub struct LoaderDispatcher {
    rules: Vec<CompiledRule>,
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| ConfigError::new(format!("invalid loader pattern '{pattern}': {e}")))
}

impl LoaderDispatcher {
    /// Compile `rules`, failing on the first invalid pattern.
    pub fn new(rules: &[LoaderRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    test: compile(&rule.test)?,
                    exclude: rule.exclude.as_deref().map(compile).transpose()?,
                    stages: rule.stages.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules })
    }

    /// Fail on the first stage a rule names that `registry` does not provide.
    pub fn check_stages(&self, registry: &TransformRegistry) -> Result<(), ConfigError> {
        for rule in &self.rules {
            if let Some(stage) = rule.stages.iter().find(|s| !registry.contains(&s.loader)) {
                return Err(ConfigError::new(format!(
                    "loader rule '{}' uses unknown stage '{}'",
                    rule.test.as_str(),
                    stage.loader
                )));
            }
        }
        Ok(())
    }

    /// The chain for `path`, in declared order.
    #[must_use]
    pub fn transforms_for(&self, path: &Path) -> &[StageSpec] {
        let subject = path.to_string_lossy().replace('\\', "/");
        self.rules
            .iter()
            .find(|rule| {
                rule.test.is_match(&subject)
                    && !rule.exclude.as_ref().is_some_and(|ex| ex.is_match(&subject))
            })
            .map_or(&[][..], |rule| rule.stages.as_slice())
    }

    /// Run the chain for `module`, last declared stage first.
    pub fn run(
        &self,
        module: &Module,
        registry: &TransformRegistry,
        ctx: &TransformContext<'_>,
    ) -> Result<ModuleOutput, TransformError> {
        let chain = self.transforms_for(&module.path);
        let mut output = ModuleOutput::new(module.content.clone());

        for stage in chain.iter().rev() {
            let transform = registry.get(&stage.loader).ok_or_else(|| TransformError {
                stage: stage.loader.clone(),
                path: module.path.display().to_string(),
                cause: "no transform registered under this name".to_string(),
            })?;

            tracing::trace!(stage = %stage.loader, path = %module.path.display(), "transform");
            output = transform
                .apply(output, &module.path, &stage.options, ctx)
                .map_err(|e| TransformError {
                    stage: stage.loader.clone(),
                    path: module.path.display().to_string(),
                    cause: e.to_string(),
                })?;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaders(chain: &[StageSpec]) -> Vec<&str> {
        chain.iter().map(|s| s.loader.as_str()).collect()
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let dispatcher = LoaderDispatcher::new(&[
            LoaderRule::new(r"\.ts$").stage(StageSpec::new("first")),
            LoaderRule::new(r"\.ts$").stage(StageSpec::new("second")),
        ])
        .unwrap();

        let chain = dispatcher.transforms_for(Path::new("/app/src/main.ts"));
        assert_eq!(loaders(chain), vec!["first"]);
    }

    #[test]
    fn test_exclude_skips_rule() {
        let dispatcher = LoaderDispatcher::new(&[
            LoaderRule::new(r"\.tsx?$")
                .exclude("node_modules")
                .stage(StageSpec::new("script")),
            LoaderRule::new(r"\.ts$").stage(StageSpec::new("fallback")),
        ])
        .unwrap();

        assert_eq!(
            loaders(dispatcher.transforms_for(Path::new("/app/node_modules/lib/index.ts"))),
            vec!["fallback"]
        );
        assert_eq!(
            loaders(dispatcher.transforms_for(Path::new("/app/src/index.tsx"))),
            vec!["script"]
        );
    }

    #[test]
    fn test_no_match_is_empty_chain() {
        let dispatcher =
            LoaderDispatcher::new(&[LoaderRule::new(r"\.ts$").stage(StageSpec::new("script"))])
                .unwrap();
        assert!(dispatcher.transforms_for(Path::new("/app/readme.md")).is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = LoaderDispatcher::new(&[LoaderRule::new("[")]).unwrap_err();
        assert!(err.message.contains("invalid loader pattern '['"));

        let err = LoaderDispatcher::new(&[LoaderRule::new("a").exclude("(")]).unwrap_err();
        assert!(err.message.contains("'('"));
    }
}
