//! Precompressed siblings for text assets.

use flate2::write::GzEncoder;
use flate2::Compression;
use regex_lite::Regex;
use std::io::{self, Write};

use crate::bundler::assets::{Asset, AssetKind};
use crate::bundler::plugin::{HookResult, Plugin, PluginContext};
use crate::error::ConfigError;
use crate::pipeline::CompressionAlgorithm;

/// A sibling is only kept when `compressed / original` is below this.
const MIN_RATIO: f64 = 0.8;

/// Adds `<path>.br` (or `.gz`) next to every asset whose output path matches
/// `test`. Originals are kept.
#[derive(Debug)]
pub struct CompressionPlugin {
    algorithm: CompressionAlgorithm,
    test: Regex,
}

impl CompressionPlugin {
    pub fn new(algorithm: CompressionAlgorithm, test: &str) -> Result<Self, ConfigError> {
        let test = Regex::new(test).map_err(|e| {
            ConfigError::new(format!("invalid compression pattern '{test}': {e}"))
        })?;
        Ok(Self { algorithm, test })
    }
}

impl Plugin for CompressionPlugin {
    fn name(&self) -> &str {
        "compression"
    }

    fn on_done(&self, ctx: &mut PluginContext<'_>) -> HookResult {
        let mut siblings = Vec::new();

        for asset in &ctx.assets {
            if asset.kind == AssetKind::Compressed
                || asset.content.is_empty()
                || !self.test.is_match(&asset.output_path)
            {
                continue;
            }

            let compressed = compress(self.algorithm, &asset.content)?;
            #[allow(clippy::cast_precision_loss)]
            let ratio = compressed.len() as f64 / asset.content.len() as f64;
            if ratio >= MIN_RATIO {
                tracing::debug!(asset = %asset.name, ratio, "not worth compressing");
                continue;
            }

            let ext = self.algorithm.extension();
            siblings.push(
                Asset::new(
                    format!("{}{ext}", asset.name),
                    format!("{}{ext}", asset.output_path),
                    AssetKind::Compressed,
                    compressed,
                )
                .with_sources(asset.source_modules.clone()),
            );
        }

        for sibling in siblings {
            ctx.manifest
                .insert(sibling.name.clone(), sibling.output_path.clone());
            ctx.emit_asset(sibling);
        }
        Ok(())
    }
}

/// Compress `bytes` at the highest level of `algorithm`.
pub fn compress(algorithm: CompressionAlgorithm, bytes: &[u8]) -> io::Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::Brotli => {
            let mut out = Vec::new();
            {
                let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 11, 22);
                writer.write_all(bytes)?;
                writer.flush()?;
            }
            Ok(out)
        }
        CompressionAlgorithm::Gzip => gzip(bytes, Compression::best()),
    }
}

/// Gzip `bytes` at `level`.
pub fn gzip(bytes: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), level);
    encoder.write_all(bytes)?;
    encoder.finish()
}
