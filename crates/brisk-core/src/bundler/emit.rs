//! Writing a build to disk.
//!
//! Files go to a staging directory next to the output root first. Only when
//! every file is written is the staging directory swapped in, so the output
//! root holds either the previous build or the complete new one.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::manifest::MANIFEST_FILE;
use super::BuildOutput;
use crate::error::BuildError;

/// What [`emit`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitSummary {
    pub out_dir: PathBuf,
    /// Output paths written, manifest included.
    pub files: Vec<String>,
    pub bytes: u64,
}

/// Write every asset and `manifest.json` under `out_dir`.
pub fn emit(output: &BuildOutput, out_dir: &Path) -> Result<EmitSummary, BuildError> {
    let staging = brisk_util::fs::sibling_path(out_dir, "staging");
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| BuildError::io(&staging, e))?;
    }

    let result = write_all(output, &staging);
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    brisk_util::fs::replace_dir(&staging, out_dir).map_err(|e| {
        let _ = fs::remove_dir_all(&staging);
        BuildError::io(out_dir, e)
    })?;

    tracing::info!(
        dir = %out_dir.display(),
        files = summary.files.len(),
        bytes = summary.bytes,
        "output written"
    );
    Ok(EmitSummary {
        out_dir: out_dir.to_path_buf(),
        ..summary
    })
}

fn write_all(output: &BuildOutput, staging: &Path) -> Result<EmitSummary, BuildError> {
    fs::create_dir_all(staging).map_err(|e| BuildError::io(staging, e))?;

    let mut files = Vec::with_capacity(output.assets.len() + 1);
    let mut bytes = 0u64;

    for asset in &output.assets {
        let rel = safe_relative(&asset.output_path)?;
        let path = staging.join(rel);
        brisk_util::fs::write_creating_dirs(&path, &asset.content)
            .map_err(|e| BuildError::io(&path, e))?;
        tracing::debug!(file = %asset.output_path, bytes = asset.content.len(), "write");
        files.push(asset.output_path.clone());
        bytes += asset.content.len() as u64;
    }

    let manifest = output.manifest.to_json();
    let path = staging.join(MANIFEST_FILE);
    fs::write(&path, &manifest).map_err(|e| BuildError::io(&path, e))?;
    files.push(MANIFEST_FILE.to_string());
    bytes += manifest.len() as u64;

    Ok(EmitSummary {
        out_dir: staging.to_path_buf(),
        files,
        bytes,
    })
}

/// `output_path` as a relative path that cannot leave the output root.
fn safe_relative(output_path: &str) -> Result<PathBuf, BuildError> {
    let path = Path::new(output_path);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if output_path.is_empty() || escapes {
        return Err(BuildError::Internal(format!(
            "refusing to write '{output_path}' outside the output directory"
        )));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{Asset, AssetKind, Manifest, ModuleGraph};
    use tempfile::tempdir;

    fn output(assets: Vec<Asset>) -> BuildOutput {
        let mut manifest = Manifest::new();
        for asset in &assets {
            manifest.insert(asset.name.clone(), asset.output_path.clone());
        }
        BuildOutput {
            assets,
            manifest,
            diagnostics: Vec::new(),
            modules: Vec::new(),
            graph: ModuleGraph::default(),
        }
    }

    #[test]
    fn test_emit_replaces_previous_output() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("dist");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("stale.js"), "old").unwrap();

        let summary = emit(
            &output(vec![Asset::new(
                "main.js",
                "static/js/main.js",
                AssetKind::Js,
                b"run()".to_vec(),
            )]),
            &out_dir,
        )
        .unwrap();

        assert_eq!(summary.files, vec!["static/js/main.js", "manifest.json"]);
        assert_eq!(fs::read_to_string(out_dir.join("static/js/main.js")).unwrap(), "run()");
        assert!(!out_dir.join("stale.js").exists());
        let manifest: Manifest =
            serde_json::from_str(&fs::read_to_string(out_dir.join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest.get("main.js"), Some("static/js/main.js"));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["dist"]);
    }

    #[test]
    fn test_failed_emit_leaves_output_untouched() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("dist");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("index.html"), "previous").unwrap();

        let err = emit(
            &output(vec![
                Asset::new("index.html", "index.html", AssetKind::Html, b"new".to_vec()),
                Asset::new("evil", "../evil.js", AssetKind::Js, b"x".to_vec()),
            ]),
            &out_dir,
        )
        .unwrap_err();

        assert!(err.to_string().contains("../evil.js"));
        assert_eq!(fs::read_to_string(out_dir.join("index.html")).unwrap(), "previous");
        assert!(!dir.path().join("evil.js").exists());
    }
}
