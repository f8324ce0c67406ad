//! Project configuration and the immutable per-invocation build configuration.
//!
//! `brisk.config.json` is optional; every field has a default. The Mode
//! Controller's [`PipelineDescription`] and the loaded `.env` map are combined
//! with it by [`BuildConfig::from_project`], which validates the result once.
//! Nothing mutates a [`BuildConfig`] afterwards; it is shared by reference (or
//! `Arc`) for the lifetime of the invocation.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::bundler::loader::{LoaderDispatcher, LoaderRule};
use crate::bundler::resolve::Resolver;
use crate::error::ConfigError;
use crate::pipeline::{assemble_pipeline, PipelineDescription, PipelineFlags, PluginSpec};

/// Default project configuration file name.
pub const CONFIG_FILE: &str = "brisk.config.json";

/// Default dev server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::new(format!(
                "unknown mode '{other}' (expected 'development' or 'production')"
            ))),
        }
    }
}

/// Alias table as declared in the project file, in declaration order.
///
/// Deserialized from a JSON object without collapsing duplicate keys, so
/// validation can reject them instead of silently keeping the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable(pub Vec<(String, String)>);

impl<'de> Deserialize<'de> for AliasTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AliasVisitor;

        impl<'de> Visitor<'de> for AliasVisitor {
            type Value = AliasTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of alias prefixes to paths")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<AliasTable, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    entries.push((key, value));
                }
                Ok(AliasTable(entries))
            }
        }

        deserializer.deserialize_map(AliasVisitor)
    }
}

impl Serialize for AliasTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Dev server section of the project file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub host: Option<String>,
}

/// Contents of `brisk.config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project root. Not part of the file; set by [`ProjectConfig::load`].
    #[serde(skip)]
    pub root: PathBuf,
    /// Entry specifiers, relative to the root.
    pub entry: Vec<String>,
    /// Extension priority list.
    pub extensions: Vec<String>,
    /// Alias prefix → path (relative to the root).
    pub alias: AliasTable,
    /// Output directory.
    pub output: String,
    /// Static files directory.
    pub public: String,
    pub server: ServerConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            entry: vec!["./src/index.tsx".to_string()],
            extensions: [".tsx", ".ts", ".jsx", ".js"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            alias: AliasTable::default(),
            output: "dist".to_string(),
            public: "public".to_string(),
            server: ServerConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Load the project file for `root`.
    ///
    /// `explicit` names a config file (relative to `root`); it must exist. Without
    /// it, `brisk.config.json` is used when present and defaults otherwise.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => {
                let path = root.join(path);
                if !path.is_file() {
                    return Err(ConfigError::new(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Some(path)
            }
            None => Some(root.join(CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    ConfigError::new(format!("failed to read {}: {e}", path.display()))
                })?;
                tracing::debug!(path = %path.display(), "loaded project config");
                Self::parse(&content)
                    .map_err(|e| ConfigError::new(format!("{}: {}", path.display(), e.message)))?
            }
            None => Self::default(),
        };

        config.root = root.to_path_buf();
        Ok(config)
    }

    /// Parse project file contents.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::new(e.to_string()))
    }

    /// Server port, falling back to the default.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }

    /// Server host, falling back to `localhost`.
    #[must_use]
    pub fn host(&self) -> &str {
        self.server.host.as_deref().unwrap_or("localhost")
    }
}

/// Output naming templates, one per asset family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputTemplates {
    pub script: String,
    pub style: String,
    pub media: String,
    pub font: String,
}

/// A resolved alias: prefix and absolute target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub prefix: String,
    pub target: PathBuf,
}

/// Immutable configuration for one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildConfig {
    pub mode: Mode,
    pub root: PathBuf,
    pub entries: Vec<String>,
    pub aliases: Vec<Alias>,
    pub extensions: Vec<String>,
    pub output_root: PathBuf,
    pub public_dir: PathBuf,
    pub output: OutputTemplates,
    pub loader_rules: Vec<LoaderRule>,
    pub plugins: Vec<PluginSpec>,
    pub analyze: bool,
    pub source_maps: bool,
    pub dev_server: bool,
    pub env: BTreeMap<String, String>,
}

impl BuildConfig {
    /// Combine the project file, the assembled pipeline and the environment map,
    /// then validate.
    ///
    /// Fails when there are no entries, an entry does not resolve, an alias key
    /// is declared twice, or a loader pattern does not compile. Stage names
    /// are checked by the bundler against the registry it runs with.
    pub fn from_project(
        project: &ProjectConfig,
        pipeline: PipelineDescription,
        env: BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        if project.entry.is_empty() {
            return Err(ConfigError::new("at least one entry is required"));
        }

        let root = dunce::canonicalize(&project.root).map_err(|e| {
            ConfigError::new(format!(
                "project root {} is not accessible: {e}",
                project.root.display()
            ))
        })?;

        let mut seen = HashSet::new();
        let mut aliases = Vec::with_capacity(project.alias.0.len());
        for (prefix, target) in &project.alias.0 {
            if prefix.is_empty() {
                return Err(ConfigError::new("alias keys must not be empty"));
            }
            if !seen.insert(prefix.as_str()) {
                return Err(ConfigError::new(format!("duplicate alias key '{prefix}'")));
            }
            let joined = root.join(target);
            let target = dunce::canonicalize(&joined).unwrap_or(joined);
            aliases.push(Alias {
                prefix: prefix.clone(),
                target,
            });
        }

        // Compiling the dispatcher validates every pattern.
        LoaderDispatcher::new(&pipeline.loader_rules)?;

        let analyze = pipeline
            .plugins
            .iter()
            .any(|p| matches!(p, PluginSpec::BundleAnalyzer));

        let config = Self {
            mode: pipeline.mode,
            output_root: root.join(&project.output),
            public_dir: root.join(&project.public),
            root,
            entries: project.entry.clone(),
            aliases,
            extensions: project.extensions.clone(),
            output: pipeline.output,
            loader_rules: pipeline.loader_rules,
            plugins: pipeline.plugins,
            analyze,
            source_maps: pipeline.source_maps,
            dev_server: pipeline.dev_server_enabled,
            env,
        };

        let resolver = Resolver::new(&config);
        for entry in &config.entries {
            resolver
                .resolve_entry(entry)
                .map_err(|e| ConfigError::new(format!("entry does not resolve: {e}")))?;
        }

        Ok(config)
    }

    /// Load everything needed for one invocation from the project root.
    pub fn load(
        root: &Path,
        mode: Mode,
        flags: &PipelineFlags,
        config_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let project = ProjectConfig::load(root, config_file)?;
        let env = crate::env::load_env_files(root, mode);
        Self::from_project(&project, assemble_pipeline(mode, flags), env)
    }

    /// Path of `path` relative to the project root, `/`-separated.
    #[must_use]
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => brisk_util::fs::to_slash(rel),
            Err(_) => brisk_util::fs::to_slash(path),
        }
    }
}
