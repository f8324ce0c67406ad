//! Copies the public directory into the output root.

use crate::bundler::assets::{Asset, AssetKind};
use crate::bundler::plugin::{HookResult, Plugin, PluginContext};
use crate::config::BuildConfig;

/// The root document; the html plugin owns it.
const ROOT_DOCUMENT: &str = "index.html";

/// Emits every file under `public_dir` except the root `index.html`, keeping
/// its relative path.
#[derive(Debug, Default)]
pub struct CopyPlugin;

impl CopyPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for CopyPlugin {
    fn name(&self) -> &str {
        "copy"
    }

    fn on_init(&self, config: &BuildConfig) -> HookResult {
        if !config.public_dir.is_dir() {
            tracing::debug!(dir = %config.public_dir.display(), "no public directory");
        }
        Ok(())
    }

    fn on_done(&self, ctx: &mut PluginContext<'_>) -> HookResult {
        let public_dir = &ctx.config().public_dir;

        for rel in brisk_util::fs::list_files(public_dir) {
            if rel == ROOT_DOCUMENT {
                continue;
            }
            let path = public_dir.join(&rel);
            let content = std::fs::read(&path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;

            tracing::debug!(file = %rel, "copying public file");
            ctx.manifest.insert(rel.clone(), rel.clone());
            ctx.emit_asset(Asset::new(
                rel.clone(),
                rel.clone(),
                AssetKind::from_path(&rel),
                content,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::manifest::Manifest;
    use crate::bundler::plugin::PluginContainer;
    use crate::config::Mode;
    use crate::test_util::fixture;

    #[test]
    fn test_copies_public_files_except_root_document() {
        let (_dir, config) = fixture(
            &[
                ("public/index.html", "<html></html>"),
                ("public/favicon.ico", "icon"),
                ("public/docs/index.html", "<p>docs</p>"),
                ("public/robots.txt", "User-agent: *"),
            ],
            Mode::Production,
        );
        let mut container = PluginContainer::new();
        container.add(Box::new(CopyPlugin));
        let out = container.run(&config, Vec::new(), Manifest::new()).unwrap();

        let mut names: Vec<_> = out.assets.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["docs/index.html", "favicon.ico", "robots.txt"]);
        assert_eq!(out.manifest.get("robots.txt"), Some("robots.txt"));
        assert_eq!(out.manifest.get("index.html"), None);

        let favicon = out.assets.iter().find(|a| a.name == "favicon.ico").unwrap();
        assert_eq!(favicon.kind, AssetKind::Media);
        assert_eq!(favicon.content, b"icon");
    }

    #[test]
    fn test_missing_public_dir_is_fine() {
        let (_dir, config) = fixture(&[], Mode::Development);
        let mut container = PluginContainer::new();
        container.add(Box::new(CopyPlugin));
        let out = container.run(&config, Vec::new(), Manifest::new()).unwrap();
        assert!(out.assets.is_empty());
    }
}
