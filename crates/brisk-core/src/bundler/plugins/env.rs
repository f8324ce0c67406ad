//! `process.env.KEY` replacement in script assets.

use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

use crate::bundler::assets::{Asset, AssetKind};
use crate::bundler::plugin::{HookResult, Plugin, PluginContext};

fn env_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\bprocess\.env\.([A-Za-z_][A-Za-z0-9_]*)").ok())
        .as_ref()
}

/// Inlines environment values as JSON string literals.
///
/// `NODE_ENV` falls back to the build mode when the environment does not set
/// it. References to unknown keys are left untouched.
#[derive(Debug, Default)]
pub struct EnvPlugin;

impl EnvPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for EnvPlugin {
    fn name(&self) -> &str {
        "env"
    }

    fn on_asset(&self, ctx: &mut PluginContext<'_>, asset: &mut Asset) -> HookResult {
        if asset.kind != AssetKind::Js {
            return Ok(());
        }
        let Some(pattern) = env_pattern() else {
            return Ok(());
        };

        let config = ctx.config();
        let text = asset.text().into_owned();
        if !pattern.is_match(&text) {
            return Ok(());
        }

        let replaced = pattern.replace_all(&text, |caps: &Captures<'_>| {
            let key = &caps[1];
            let value = config.env.get(key).map(String::as_str).or_else(|| {
                (key == "NODE_ENV").then(|| config.mode.as_str())
            });
            match value {
                Some(value) => json_quote(value),
                None => caps[0].to_string(),
            }
        });
        asset.content = replaced.into_owned().into_bytes();
        Ok(())
    }
}

fn json_quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::manifest::Manifest;
    use crate::config::Mode;
    use crate::test_util::fixture_with_env;
    use std::collections::BTreeMap;

    fn run(source: &str, env: &[(&str, &str)], mode: Mode) -> String {
        let env: BTreeMap<_, _> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let (_dir, config) = fixture_with_env(&[], mode, env);
        let mut ctx = PluginContext::new(&config, Manifest::new());
        let mut asset = Asset::new("main.js", "static/js/main.js", AssetKind::Js, source.into());
        EnvPlugin.on_asset(&mut ctx, &mut asset).unwrap();
        asset.text().into_owned()
    }

    #[test]
    fn test_replaces_known_keys() {
        let out = run(
            "const url = process.env.API_URL;\nconst q = process.env.QUOTE;",
            &[("API_URL", "https://api.test"), ("QUOTE", "a\"b")],
            Mode::Development,
        );
        assert_eq!(
            out,
            "const url = \"https://api.test\";\nconst q = \"a\\\"b\";"
        );
    }

    #[test]
    fn test_unknown_key_untouched() {
        let out = run("f(process.env.MISSING)", &[], Mode::Development);
        assert_eq!(out, "f(process.env.MISSING)");
    }

    #[test]
    fn test_node_env_defaults_to_mode() {
        assert_eq!(
            run("process.env.NODE_ENV", &[], Mode::Production),
            "\"production\""
        );
        assert_eq!(
            run("process.env.NODE_ENV", &[("NODE_ENV", "test")], Mode::Production),
            "\"test\""
        );
    }

    #[test]
    fn test_longer_key_not_partially_replaced() {
        let out = run("process.env.API_URL_V2", &[("API_URL", "x")], Mode::Development);
        assert_eq!(out, "process.env.API_URL_V2");
    }

    #[test]
    fn test_non_script_assets_skipped() {
        let (_dir, config) = fixture_with_env(&[], Mode::Development, BTreeMap::new());
        let mut ctx = PluginContext::new(&config, Manifest::new());
        let mut asset = Asset::new(
            "main.css",
            "static/css/main.css",
            AssetKind::Css,
            b"/* process.env.NODE_ENV */".to_vec(),
        );
        EnvPlugin.on_asset(&mut ctx, &mut asset).unwrap();
        assert_eq!(asset.text(), "/* process.env.NODE_ENV */");
    }
}
