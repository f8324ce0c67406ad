//! Error taxonomy for the build pipeline.
//!
//! Every variant aborts the current build cycle. None of them touch state that
//! outlives the cycle: a failed build never publishes a manifest and never
//! leaves a half-written output directory behind.

use std::path::PathBuf;
use thiserror::Error;

use crate::bundler::{Diagnostic, Severity};

/// An import specifier that could not be mapped to a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot resolve '{specifier}' from '{from}'")]
pub struct ResolutionError {
    /// The specifier exactly as written in the importing module.
    pub specifier: String,
    /// The importing module (or project root for entry points).
    pub from: String,
}

/// A loader stage failed on a module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transform '{stage}' failed on {path}: {cause}")]
pub struct TransformError {
    /// Name of the stage that failed.
    pub stage: String,
    /// Module path.
    pub path: String,
    /// Underlying cause.
    pub cause: String,
}

impl TransformError {
    /// This failure as an error diagnostic raised by its stage.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            source: self.stage.clone(),
            message: self.to_string(),
        }
    }
}

/// A plugin hook returned an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{plugin}] {hook}: {cause}")]
pub struct PluginError {
    /// Plugin name.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    /// Underlying cause.
    pub cause: String,
}

/// The build configuration is structurally invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid configuration: {message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Any failure that aborts a build cycle.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A loader stage failed. `diagnostics` holds every stage failure of
    /// the build, `error` first.
    #[error("{error}")]
    Transform {
        error: TransformError,
        diagnostics: Vec<Diagnostic>,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Internal(String),
}

impl From<TransformError> for BuildError {
    fn from(error: TransformError) -> Self {
        let diagnostics = vec![error.to_diagnostic()];
        Self::Transform { error, diagnostics }
    }
}

impl BuildError {
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Diagnostics recorded before the build was aborted.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Transform { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    /// Stable, machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "BUILD_RESOLUTION_ERROR",
            Self::Transform { .. } => "BUILD_TRANSFORM_ERROR",
            Self::Plugin(_) => "BUILD_PLUGIN_ERROR",
            Self::Config(_) => "BUILD_CONFIG_ERROR",
            Self::Io { .. } => "BUILD_IO_ERROR",
            Self::Internal(_) => "BUILD_INTERNAL_ERROR",
        }
    }
}
