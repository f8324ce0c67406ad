//! `brisk build` command implementation.
//!
//! Runs one build for the requested mode and writes the result to the
//! project's output directory.

use brisk_core::bundler::Diagnostic;
use brisk_core::{emit, BuildConfig, BuildError, Bundler, EmitSummary, Mode, PipelineFlags};
use miette::{miette, IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    /// Project root.
    pub cwd: PathBuf,
    pub mode: Mode,
    /// Optional production stages.
    pub flags: PipelineFlags,
    /// Explicit config file (relative to `cwd`).
    pub config: Option<PathBuf>,
}

/// JSON output for the build command.
#[derive(Serialize)]
struct BuildResultJson {
    ok: bool,
    mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    out_dir: Option<String>,
    files: Vec<String>,
    modules: usize,
    size_bytes: u64,
    duration_ms: u64,
    warnings: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<BuildErrorJson>,
}

#[derive(Serialize)]
struct BuildErrorJson {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    diagnostics: Vec<Diagnostic>,
}

struct Built {
    summary: EmitSummary,
    modules: usize,
    diagnostics: Vec<Diagnostic>,
}

fn build_and_emit(action: &BuildAction) -> Result<Built, BuildError> {
    let config = BuildConfig::load(
        &action.cwd,
        action.mode,
        &action.flags,
        action.config.as_deref(),
    )?;
    let out_dir = config.output_root.clone();

    let output = Bundler::new(Arc::new(config))?.build()?;
    let summary = emit(&output, &out_dir)?;

    Ok(Built {
        summary,
        modules: output.modules.len(),
        diagnostics: output.diagnostics,
    })
}

/// Run the build command.
pub fn run(action: &BuildAction, json: bool) -> Result<()> {
    let start = Instant::now();
    let result = build_and_emit(action);
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(built) => {
            if json {
                let out = BuildResultJson {
                    ok: true,
                    mode: action.mode,
                    out_dir: Some(built.summary.out_dir.display().to_string()),
                    files: built.summary.files,
                    modules: built.modules,
                    size_bytes: built.summary.bytes,
                    duration_ms,
                    warnings: built.diagnostics,
                    error: None,
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
            } else {
                println!(
                    "  {} -> {} ({} modules, {:.1}KB, {}ms)",
                    action.mode,
                    built.summary.out_dir.display(),
                    built.modules,
                    built.summary.bytes as f64 / 1024.0,
                    duration_ms
                );
                for file in &built.summary.files {
                    println!("    + {file}");
                }
                for warning in &built.diagnostics {
                    eprintln!("  warning: [{}] {}", warning.source, warning.message);
                }
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(code = e.code(), "build failed");
            if json {
                let out = BuildResultJson {
                    ok: false,
                    mode: action.mode,
                    out_dir: None,
                    files: Vec::new(),
                    modules: 0,
                    size_bytes: 0,
                    duration_ms,
                    warnings: Vec::new(),
                    error: Some(BuildErrorJson {
                        code: e.code().to_string(),
                        message: e.to_string(),
                        diagnostics: e.diagnostics().to_vec(),
                    }),
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
                std::process::exit(1);
            }
            for diagnostic in e.diagnostics().iter().skip(1) {
                eprintln!("  error: [{}] {}", diagnostic.source, diagnostic.message);
            }
            Err(miette!(code = e.code(), "{e}"))
        }
    }
}
