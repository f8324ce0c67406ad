//! Build progress logging.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bundler::assets::Asset;
use crate::bundler::plugin::{HookResult, Plugin, PluginContext};
use crate::config::BuildConfig;

/// Logs each lifecycle stage through `tracing`.
#[derive(Debug, Default)]
pub struct ProgressPlugin {
    processed: AtomicUsize,
}

impl ProgressPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for ProgressPlugin {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_init(&self, config: &BuildConfig) -> HookResult {
        self.processed.store(0, Ordering::Relaxed);
        tracing::info!(
            mode = %config.mode,
            entries = config.entries.len(),
            "optimizing assets"
        );
        Ok(())
    }

    fn on_asset(&self, _ctx: &mut PluginContext<'_>, asset: &mut Asset) -> HookResult {
        let n = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(n, asset = %asset.name, bytes = asset.content.len(), "asset");
        Ok(())
    }

    fn on_done(&self, ctx: &mut PluginContext<'_>) -> HookResult {
        let bytes: usize = ctx.assets.iter().map(|a| a.content.len()).sum();
        tracing::info!(
            assets = ctx.assets.len(),
            bytes,
            warnings = ctx.diagnostics().len(),
            "assets processed"
        );
        Ok(())
    }
}
