//! Build-cycle state and the published build.
//!
//! Cycles move `Idle → Building → Ready | Failed`, each with a generation
//! number that only grows. A successful build is published by swapping one
//! `Arc`, so a request sees either the old build or the new one in full.

use rustc_hash::FxHashMap as HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

use super::messages::LiveMessage;
use crate::bundler::assets::content_type;
use crate::bundler::{BuildOutput, Manifest};

/// Root document served for unknown paths.
const ROOT_DOCUMENT: &str = "index.html";

/// Default number of messages a slow client may fall behind before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Where the current build cycle stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Building { generation: u64 },
    Ready { generation: u64 },
    Failed { generation: u64, message: String },
}

/// A successful build as served to clients.
#[derive(Debug)]
pub struct PublishedBuild {
    pub generation: u64,
    pub manifest: Manifest,
    files: HashMap<String, Vec<u8>>,
}

impl PublishedBuild {
    #[must_use]
    pub fn from_output(generation: u64, output: &BuildOutput) -> Self {
        let files = output
            .assets
            .iter()
            .map(|a| (a.output_path.clone(), a.content.clone()))
            .collect();
        Self {
            generation,
            manifest: output.manifest.clone(),
            files,
        }
    }

    /// File by output path (no leading `/`).
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A response body for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    /// Output path actually served.
    pub path: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// State shared between the dev session and the server.
#[derive(Debug)]
pub struct DevState {
    cycle: RwLock<CycleState>,
    published: RwLock<Option<Arc<PublishedBuild>>>,
    generation: AtomicU64,
    tx: broadcast::Sender<LiveMessage>,
}

impl Default for DevState {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl DevState {
    /// `capacity` bounds the broadcast channel; lagging clients drop messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            cycle: RwLock::new(CycleState::Idle),
            published: RwLock::new(None),
            generation: AtomicU64::new(0),
            tx,
        }
    }

    /// A receiver for every message broadcast from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LiveMessage> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn cycle(&self) -> CycleState {
        self.cycle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the build being served.
    #[must_use]
    pub fn published(&self) -> Option<Arc<PublishedBuild>> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Generation of the build being served (0 before the first one).
    #[must_use]
    pub fn published_generation(&self) -> u64 {
        self.published().map_or(0, |b| b.generation)
    }

    /// Start a cycle and return its generation.
    pub fn begin_build(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_cycle(CycleState::Building { generation });
        tracing::debug!(generation, "building");
        generation
    }

    /// Publish a successful build and broadcast `update`.
    ///
    /// Returns `false`, changing nothing, when a newer build is already
    /// published.
    pub fn publish(&self, generation: u64, output: &BuildOutput, modules: Vec<String>) -> bool {
        {
            let mut published = self
                .published
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if published.as_ref().is_some_and(|b| b.generation >= generation) {
                tracing::debug!(generation, "discarding stale build");
                return false;
            }
            *published = Some(Arc::new(PublishedBuild::from_output(generation, output)));
        }

        self.set_cycle(CycleState::Ready { generation });
        tracing::info!(generation, affected = modules.len(), "build published");
        self.broadcast(LiveMessage::Update {
            generation,
            modules,
        });
        true
    }

    /// Record a failed build and broadcast `error`. The published build is
    /// left in place. Returns `false` for a stale generation.
    pub fn fail(&self, generation: u64, message: String) -> bool {
        if self.published_generation() >= generation {
            return false;
        }
        tracing::warn!(generation, "build failed: {message}");
        self.set_cycle(CycleState::Failed {
            generation,
            message: message.clone(),
        });
        self.broadcast(LiveMessage::Error {
            generation,
            message,
        });
        true
    }

    /// The first message for a newly connected client.
    #[must_use]
    pub fn hello(&self) -> LiveMessage {
        LiveMessage::Connected {
            generation: self.published_generation(),
        }
    }

    /// Resolve a request path against the published build. Paths that are
    /// not part of the build get the root document.
    #[must_use]
    pub fn lookup(&self, request_path: &str) -> Option<Served> {
        let build = self.published()?;
        let path = request_path.trim_start_matches('/');
        let path = if path.is_empty() { ROOT_DOCUMENT } else { path };

        let (path, body) = match build.file(path) {
            Some(body) => (path, body),
            None => (ROOT_DOCUMENT, build.file(ROOT_DOCUMENT)?),
        };
        Some(Served {
            path: path.to_string(),
            content_type: content_type(path),
            body: body.to_vec(),
        })
    }

    fn set_cycle(&self, state: CycleState) {
        *self.cycle.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn broadcast(&self, message: LiveMessage) {
        // No receivers is fine.
        let _ = self.tx.send(message);
    }
}
