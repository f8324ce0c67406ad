//! Integration tests for `brisk build --json` output.
//!
//! These tests verify:
//! - stdout is exactly one JSON object, on success and on failure
//! - failures carry a stable SCREAMING_SNAKE_CASE code and exit non-zero
//! - flags reach the pipeline (`--no-hash`, `--analyze`)

use std::path::Path;
use std::process::{Command, Output};
use tempfile::{tempdir, TempDir};

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "brisk-cli", "--bin", "brisk", "--"]);
    cmd
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    dir
}

fn build(dir: &Path, extra: &[&str]) -> (Output, serde_json::Value) {
    let output = cargo_bin()
        .args(["build", "--json", "--cwd"])
        .arg(dir)
        .args(extra)
        .output()
        .expect("Failed to run build command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json = serde_json::from_str(stdout.trim()).expect("Output should be valid JSON");
    (output, json)
}

#[test]
fn test_build_json_success() {
    let dir = project(&[
        ("src/index.tsx", "import './app.css';\nconsole.log('hi');\n"),
        ("src/app.css", "body { margin: 0; }\n"),
    ]);
    let (output, json) = build(dir.path(), &[]);

    assert!(output.status.success());
    assert_eq!(json["ok"], true);
    assert_eq!(json["mode"], "production");
    assert!(json["warnings"].is_array());

    let files: Vec<&str> = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f.as_str())
        .collect();
    assert!(files.contains(&"index.html"));
    assert!(files.contains(&"manifest.json"));
    assert!(files.iter().any(|f| f.starts_with("static/js/main.") && f.ends_with(".js")));

    let dist = dir.path().join("dist");
    assert!(dist.join("index.html").is_file());
    assert!(dist.join("manifest.json").is_file());
}

#[test]
fn test_build_no_hash_and_analyze() {
    let dir = project(&[("src/index.tsx", "console.log('hi');\n")]);
    let (output, _json) = build(dir.path(), &["--no-hash", "--analyze", "--no-compress"]);
    assert!(output.status.success());

    let dist = dir.path().join("dist");
    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dist.join("manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["main.js"], "static/js/main.js");
    assert!(manifest.get("main.js.br").is_none());
    assert!(dist.join("report.json").is_file());
}

#[test]
fn test_build_unresolvable_import_fails() {
    let dir = project(&[("src/index.tsx", "import './missing';\n")]);
    let (output, json) = build(dir.path(), &[]);

    assert!(!output.status.success());
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "BUILD_RESOLUTION_ERROR");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("'./missing'"));
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn test_build_transform_failures_listed() {
    let dir = project(&[
        ("src/index.tsx", "import './a.scss';\nimport './b.scss';\n"),
        ("src/a.scss", "a { color: $nope; }\n"),
        ("src/b.scss", "b { color: $missing; }\n"),
    ]);
    let (output, json) = build(dir.path(), &[]);

    assert!(!output.status.success());
    assert_eq!(json["error"]["code"], "BUILD_TRANSFORM_ERROR");
    let diagnostics = json["error"]["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0]["severity"], "error");
    assert_eq!(diagnostics[0]["source"], "sass");
    assert!(diagnostics[1]["message"].as_str().unwrap().contains("b.scss"));
}

#[test]
fn test_build_invalid_config_fails() {
    let dir = project(&[
        ("src/index.tsx", ""),
        ("brisk.config.json", r#"{ "entry": ["./src/index.tsx"], "bogus": true }"#),
    ]);
    let (output, json) = build(dir.path(), &[]);

    assert!(!output.status.success());
    assert_eq!(json["error"]["code"], "BUILD_CONFIG_ERROR");
}

#[test]
fn test_error_codes_are_screaming_snake_case() {
    let dir = project(&[("src/other.ts", "")]);
    let (_output, json) = build(dir.path(), &[]);

    let code = json["error"]["code"].as_str().unwrap();
    assert!(code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c == '_'));
}

#[test]
fn test_version_command() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("Failed to run version command");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("brisk "));
}
