//! Built-in plugins.
//!
//! Each [`PluginSpec`] variant maps to one plugin here. [`container_for`]
//! turns the ordered list from the pipeline description into a ready
//! [`PluginContainer`].

mod analyze;
mod compress;
mod copy;
mod env;
mod hash;
mod html;
mod minify;
mod progress;

pub use analyze::{BundleAnalyzerPlugin, REPORT_FILE};
pub use compress::{compress, CompressionPlugin};
pub use copy::CopyPlugin;
pub use env::EnvPlugin;
pub use hash::ContentHashPlugin;
pub use html::HtmlPlugin;
pub use minify::{minify_script, MinifyPlugin};
pub use progress::ProgressPlugin;

use super::plugin::{Plugin, PluginContainer};
use crate::error::ConfigError;
use crate::pipeline::PluginSpec;

/// Create the plugin for one spec.
pub fn instantiate(spec: &PluginSpec) -> Result<Box<dyn Plugin>, ConfigError> {
    Ok(match spec {
        PluginSpec::Env => Box::new(EnvPlugin::new()),
        PluginSpec::Copy => Box::new(CopyPlugin::new()),
        PluginSpec::Html { live_reload } => Box::new(HtmlPlugin::new(*live_reload)),
        PluginSpec::Progress => Box::new(ProgressPlugin::new()),
        PluginSpec::Minify => Box::new(MinifyPlugin::new()),
        PluginSpec::ContentHash => Box::new(ContentHashPlugin::new()),
        PluginSpec::Compression { algorithm, test } => {
            Box::new(CompressionPlugin::new(*algorithm, test)?)
        }
        PluginSpec::BundleAnalyzer => Box::new(BundleAnalyzerPlugin::new()),
    })
}

/// A container holding the plugins for `specs`, in order.
pub fn container_for(specs: &[PluginSpec]) -> Result<PluginContainer, ConfigError> {
    let mut container = PluginContainer::new();
    for spec in specs {
        container.add(instantiate(spec)?);
    }
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::pipeline::{assemble_pipeline, CompressionAlgorithm, PipelineFlags};

    #[test]
    fn test_container_follows_declared_order() {
        let flags = PipelineFlags {
            analyze: true,
            ..PipelineFlags::default()
        };
        let desc = assemble_pipeline(Mode::Production, &flags);
        let container = container_for(&desc.plugins).unwrap();

        let expected: Vec<&str> = desc.plugins.iter().map(PluginSpec::name).collect();
        assert_eq!(container.names(), expected);
    }

    #[test]
    fn test_bad_compression_pattern() {
        let spec = PluginSpec::Compression {
            algorithm: CompressionAlgorithm::Gzip,
            test: "[".to_string(),
        };
        assert!(instantiate(&spec).is_err());
    }
}
