//! The development rebuild loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::debounce::{next_batch, DEFAULT_DEBOUNCE};
use super::state::DevState;
use crate::bundler::{BuildOutput, Bundler};
use crate::config::BuildConfig;
use crate::error::BuildError;

/// Drives rebuilds from batches of file changes and publishes the results.
///
/// One build runs at a time. Changes that arrive while a build is running wait
/// in the channel and are coalesced into the next batch.
#[derive(Debug)]
pub struct DevSession {
    bundler: Arc<Bundler>,
    state: Arc<DevState>,
    debounce: Duration,
}

impl DevSession {
    #[must_use]
    pub fn new(bundler: Bundler, state: Arc<DevState>) -> Self {
        Self {
            bundler: Arc::new(bundler),
            state,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn state(&self) -> &Arc<DevState> {
        &self.state
    }

    /// Run one build cycle on a blocking worker. `changed` empty means a
    /// full build and reports every module as affected.
    pub async fn rebuild(&self, changed: &[PathBuf]) -> Result<u64, BuildError> {
        let generation = self.state.begin_build();
        let bundler = Arc::clone(&self.bundler);

        let result = tokio::task::spawn_blocking(move || bundler.build())
            .await
            .unwrap_or_else(|e| Err(BuildError::Internal(format!("build task failed: {e}"))));

        match result {
            Ok(output) => {
                let modules = affected_modules(&output, changed, self.bundler.config());
                self.state.publish(generation, &output, modules);
                Ok(generation)
            }
            Err(e) => {
                self.state.fail(generation, failure_message(&e));
                Err(e)
            }
        }
    }

    /// Build once, then rebuild for every debounced batch until `changes`
    /// closes. Failures are broadcast and do not end the loop.
    pub async fn run(self, mut changes: mpsc::Receiver<PathBuf>) {
        if let Err(e) = self.rebuild(&[]).await {
            tracing::error!(code = e.code(), "initial build failed: {e}");
        }

        while let Some(batch) = next_batch(&mut changes, self.debounce).await {
            tracing::info!(files = batch.len(), "change detected");
            for path in &batch {
                tracing::debug!(path = %path.display(), "changed");
            }
            if let Err(e) = self.rebuild(&batch).await {
                tracing::error!(code = e.code(), "rebuild failed: {e}");
            }
        }

        tracing::debug!("change stream closed");
    }
}

/// Overlay text for a failed build: every recorded diagnostic, or the error.
fn failure_message(error: &BuildError) -> String {
    match error.diagnostics() {
        [] => error.to_string(),
        diagnostics => diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Changed modules and their dependents as project-relative paths, in
/// rebuild (dependency-first) order.
fn affected_modules(output: &BuildOutput, changed: &[PathBuf], config: &BuildConfig) -> Vec<String> {
    if changed.is_empty() {
        return output.modules.iter().map(|p| config.relative(p)).collect();
    }

    let affected: Vec<&PathBuf> = output
        .graph
        .affected_by(changed)
        .into_iter()
        .filter_map(|id| output.graph.get(id).map(|m| &m.path))
        .collect();

    output
        .modules
        .iter()
        .filter(|p| affected.contains(p))
        .map(|p| config.relative(p))
        .collect()
}
