#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Core of the brisk asset pipeline.
//!
//! - [`config`]: project file, mode and the immutable [`BuildConfig`]
//! - [`pipeline`]: what each mode runs ([`assemble_pipeline`])
//! - [`bundler`]: resolver, loaders, module graph, plugins and the emitter
//! - [`dev`]: rebuild loop, published build and live-update messages

pub mod bundler;
pub mod config;
pub mod css;
pub mod dev;
pub mod env;
pub mod error;
pub mod pipeline;
pub mod version;

#[cfg(test)]
mod test_util;

pub use bundler::{emit, BuildOutput, Bundler, EmitSummary, Manifest};
pub use config::{BuildConfig, Mode, ProjectConfig};
pub use error::{BuildError, ConfigError, PluginError, ResolutionError, TransformError};
pub use pipeline::{assemble_pipeline, PipelineDescription, PipelineFlags, PluginSpec};
pub use version::VERSION;
