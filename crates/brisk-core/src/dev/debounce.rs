//! Collapsing bursts of file changes into one batch.

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default quiet period before a batch is closed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Wait for the next change and collect every change that follows within
/// `window` of the previous one. Duplicates are dropped, first-seen order is
/// kept. Returns `None` once the sender side is gone and nothing is pending.
pub async fn next_batch(
    rx: &mut mpsc::Receiver<PathBuf>,
    window: Duration,
) -> Option<Vec<PathBuf>> {
    let first = rx.recv().await?;
    let mut batch = vec![first];

    loop {
        match tokio::time::timeout(window, rx.recv()).await {
            Ok(Some(path)) => {
                if !batch.contains(&path) {
                    batch.push(path);
                }
            }
            Ok(None) | Err(_) => break,
        }
    }

    Some(batch)
}
