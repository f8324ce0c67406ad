//! Fixtures for unit tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

use crate::config::{BuildConfig, Mode, ProjectConfig};
use crate::pipeline::{assemble_pipeline, PipelineFlags};

/// Write `files` under `root`, creating directories.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// A project in a temp dir with `src/index.tsx` (empty unless given) and a
/// validated config for `mode`.
pub fn fixture(files: &[(&str, &str)], mode: Mode) -> (TempDir, BuildConfig) {
    fixture_with_env(files, mode, BTreeMap::new())
}

pub fn fixture_with_env(
    files: &[(&str, &str)],
    mode: Mode,
    env: BTreeMap<String, String>,
) -> (TempDir, BuildConfig) {
    let dir = tempdir().unwrap();
    if !files.iter().any(|(rel, _)| *rel == "src/index.tsx") {
        write_files(dir.path(), &[("src/index.tsx", "")]);
    }
    write_files(dir.path(), files);

    let project = ProjectConfig {
        root: dir.path().to_path_buf(),
        ..ProjectConfig::default()
    };
    let config =
        BuildConfig::from_project(&project, assemble_pipeline(mode, &PipelineFlags::default()), env)
            .unwrap();
    (dir, config)
}
