//! Bundle size report.

use flate2::Compression;
use serde::Serialize;

use super::compress::gzip;
use crate::bundler::assets::{Asset, AssetKind};
use crate::bundler::plugin::{HookResult, Plugin, PluginContext};

/// Logical name and output path of the report.
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetReport {
    name: String,
    path: String,
    kind: AssetKind,
    size: usize,
    gzip_size: usize,
    modules: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Totals {
    assets: usize,
    size: usize,
    gzip_size: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    assets: Vec<AssetReport>,
    totals: Totals,
}

/// Emits `report.json` listing every asset with its raw and gzip size and
/// the modules it came from, sorted by name. Precompressed siblings are left
/// out. The report holds no timestamps, so identical builds give identical
/// reports.
#[derive(Debug, Default)]
pub struct BundleAnalyzerPlugin;

impl BundleAnalyzerPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for BundleAnalyzerPlugin {
    fn name(&self) -> &str {
        "bundle-analyzer"
    }

    fn on_done(&self, ctx: &mut PluginContext<'_>) -> HookResult {
        let config = ctx.config();
        let mut assets = Vec::new();
        let mut totals = Totals::default();

        for asset in &ctx.assets {
            if matches!(asset.kind, AssetKind::Compressed | AssetKind::Report) {
                continue;
            }
            let gzip_size = gzip(&asset.content, Compression::default())?.len();
            totals.assets += 1;
            totals.size += asset.content.len();
            totals.gzip_size += gzip_size;

            let mut modules: Vec<String> = asset
                .source_modules
                .iter()
                .map(|m| config.relative(m))
                .collect();
            modules.sort();

            assets.push(AssetReport {
                name: asset.name.clone(),
                path: asset.output_path.clone(),
                kind: asset.kind,
                size: asset.content.len(),
                gzip_size,
                modules,
            });
        }
        assets.sort_by(|a, b| a.name.cmp(&b.name));

        let report = serde_json::to_vec_pretty(&Report { assets, totals })?;
        tracing::info!(
            file = REPORT_FILE,
            assets = ctx.assets.len(),
            "bundle report written"
        );
        ctx.manifest.insert(REPORT_FILE, REPORT_FILE);
        ctx.emit_asset(Asset::new(
            REPORT_FILE,
            REPORT_FILE,
            AssetKind::Report,
            report,
        ));
        Ok(())
    }
}
