//! Content hashing of output paths.

use crate::bundler::assets::{has_hash_placeholder, substitute_content_hash, AssetKind};
use crate::bundler::plugin::{HookResult, Plugin, PluginContext};

/// Replaces `[contenthash]` / `[contenthash:N]` in every output path with the
/// BLAKE3 digest of the asset's final bytes.
///
/// A source map follows its script: the map is renamed to `<script path>.map`
/// and the script's `sourceMappingURL` comment is rewritten to match.
#[derive(Debug, Default)]
pub struct ContentHashPlugin;

impl ContentHashPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for ContentHashPlugin {
    fn name(&self) -> &str {
        "content-hash"
    }

    fn on_done(&self, ctx: &mut PluginContext<'_>) -> HookResult {
        let mut companions = Vec::new();

        for asset in &mut ctx.assets {
            if asset.kind == AssetKind::Map || !has_hash_placeholder(&asset.output_path) {
                continue;
            }
            let old = std::mem::take(&mut asset.output_path);
            let new = substitute_content_hash(&old, &asset.content);

            if let Some(map) = &asset.source_map {
                let text = asset
                    .text()
                    .replace(&mapping_comment(&old), &mapping_comment(&new));
                asset.content = text.into_bytes();
                companions.push((map.clone(), format!("{new}.map")));
            }

            tracing::debug!(from = %old, to = %new, "hashed");
            ctx.manifest.rename_path(&old, &new);
            asset.output_path = new;
        }

        for (map_name, path) in companions {
            if let Some(map) = ctx.assets.iter_mut().find(|a| a.name == map_name) {
                ctx.manifest.rename_path(&map.output_path, &path);
                map.output_path = path;
            }
        }

        // Maps without a script still get their own hash.
        for asset in &mut ctx.assets {
            if has_hash_placeholder(&asset.output_path) {
                let new = substitute_content_hash(&asset.output_path, &asset.content);
                ctx.manifest.rename_path(&asset.output_path, &new);
                asset.output_path = new;
            }
        }
        Ok(())
    }
}

fn mapping_comment(script_path: &str) -> String {
    let file = script_path.rsplit('/').next().unwrap_or(script_path);
    format!("sourceMappingURL={file}.map")
}
