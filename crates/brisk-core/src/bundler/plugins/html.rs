//! Root document generation.

use crate::bundler::assets::{public_url, Asset, AssetKind};
use crate::bundler::plugin::{HookResult, Plugin, PluginContext};
use crate::dev::CLIENT_PATH;

const DOCUMENT: &str = "index.html";

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>App</title>
</head>
<body>
  <div id="root"></div>
</body>
</html>
"#;

/// Writes `index.html` with a tag for every bundled style and script.
///
/// The template is `public/index.html` when present. Paths come from the
/// manifest, so this must run after content hashing.
#[derive(Debug, Default)]
pub struct HtmlPlugin {
    live_reload: bool,
}

impl HtmlPlugin {
    #[must_use]
    pub fn new(live_reload: bool) -> Self {
        Self { live_reload }
    }
}

impl Plugin for HtmlPlugin {
    fn name(&self) -> &str {
        "html"
    }

    fn on_done(&self, ctx: &mut PluginContext<'_>) -> HookResult {
        let template_path = ctx.config().public_dir.join(DOCUMENT);
        let template = if template_path.is_file() {
            brisk_util::fs::read_to_string_lossy(&template_path)
                .map_err(|e| format!("failed to read {}: {e}", template_path.display()))?
        } else {
            DEFAULT_TEMPLATE.to_string()
        };

        let mut head = String::new();
        let mut scripts = String::new();
        for asset in &ctx.assets {
            // Bundles only; copied public files are not injected.
            if asset.source_modules.is_empty() {
                continue;
            }
            let Some(path) = ctx.manifest.get(&asset.name) else {
                continue;
            };
            match asset.kind {
                AssetKind::Css => {
                    head.push_str(&format!(
                        "  <link rel=\"stylesheet\" href=\"{}\" />\n",
                        public_url(path)
                    ));
                }
                AssetKind::Js => {
                    scripts.push_str(&format!(
                        "  <script type=\"module\" src=\"{}\"></script>\n",
                        public_url(path)
                    ));
                }
                _ => {}
            }
        }
        head.push_str(&scripts);

        let mut html = insert_before(&template, "</head>", &head);
        if self.live_reload && !html.contains(CLIENT_PATH) {
            html = insert_before(
                &html,
                "</body>",
                &format!("  <script src=\"{CLIENT_PATH}\"></script>\n"),
            );
        }

        ctx.manifest.insert(DOCUMENT, DOCUMENT);
        ctx.emit_asset(Asset::new(
            DOCUMENT,
            DOCUMENT,
            AssetKind::Html,
            html.into_bytes(),
        ));
        Ok(())
    }
}

/// Insert `fragment` before the first `marker`, or append it.
fn insert_before(html: &str, marker: &str, fragment: &str) -> String {
    if fragment.is_empty() {
        return html.to_string();
    }
    match html.find(marker) {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + fragment.len());
            out.push_str(&html[..pos]);
            out.push_str(fragment);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}\n{fragment}"),
    }
}
