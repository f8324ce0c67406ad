//! `brisk dev` command implementation.
//!
//! Development server that serves the last published build from memory.
//!
//! ## Architecture
//!
//! ```text
//! notify watcher (thread) ──paths──▶ DevSession (debounce, rebuild, publish)
//!                                           │
//!                                           ▼
//!                                   DevState (published build, broadcast)
//!                                      │                │
//!                         GET /<path> ─┘                └─▶ /__brisk/ws clients
//! ```
//!
//! Nothing is written to the output directory while the server runs.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use brisk_core::dev::{client_runtime, DevSession, DevState, CLIENT_PATH, WS_PATH};
use brisk_core::env::load_env_files;
use brisk_core::{assemble_pipeline, BuildConfig, Bundler, Mode, PipelineFlags, ProjectConfig};
use futures::{SinkExt, StreamExt};
use miette::{IntoDiagnostic, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;

/// Dev server action.
#[derive(Debug, Clone)]
pub struct DevAction {
    /// Project root.
    pub cwd: PathBuf,
    /// Overrides `server.port`.
    pub port: Option<u16>,
    /// Overrides `server.host`.
    pub host: Option<String>,
    pub debounce: Duration,
    /// Explicit config file (relative to `cwd`).
    pub config: Option<PathBuf>,
}

/// Run the dev server until Ctrl+C.
pub async fn run(action: DevAction) -> Result<()> {
    let project = ProjectConfig::load(&action.cwd, action.config.as_deref()).into_diagnostic()?;
    let port = action.port.unwrap_or_else(|| project.port());
    let host = action
        .host
        .clone()
        .unwrap_or_else(|| project.host().to_string());

    let config = BuildConfig::from_project(
        &project,
        assemble_pipeline(Mode::Development, &PipelineFlags::default()),
        load_env_files(&action.cwd, Mode::Development),
    )
    .into_diagnostic()?;
    let root = config.root.clone();
    let skip = vec![config.output_root.clone()];

    let bundler = Bundler::new(Arc::new(config)).into_diagnostic()?;
    let state = Arc::new(DevState::default());

    let (change_tx, change_rx) = mpsc::channel::<PathBuf>(256);
    std::thread::spawn(move || {
        if let Err(e) = watch_files(&root, &skip, &change_tx) {
            tracing::error!("file watcher stopped: {e}");
        }
    });

    let session = DevSession::new(bundler, Arc::clone(&state)).with_debounce(action.debounce);
    tokio::spawn(session.run(change_rx));

    let bind_host = if host == "localhost" {
        "127.0.0.1"
    } else {
        host.as_str()
    };
    let addr: SocketAddr = format!("{bind_host}:{port}").parse().into_diagnostic()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    tracing::info!(%addr, "dev server listening");

    println!();
    println!("  Dev server running at http://{host}:{port}");
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutting down");
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Routes for the live-update channel, the client runtime, and the published
/// build (with history fallback to `index.html`).
pub fn router(state: Arc<DevState>) -> Router {
    Router::new()
        .route(WS_PATH, get(live_socket))
        .route(CLIENT_PATH, get(serve_client))
        .fallback(serve_build)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn serve_client() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        client_runtime(),
    )
}

async fn serve_build(State(state): State<Arc<DevState>>, uri: Uri) -> Response {
    match state.lookup(uri.path()) {
        Some(served) => (
            [
                (header::CONTENT_TYPE, served.content_type),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            served.body,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "no build has been published yet",
        )
            .into_response(),
    }
}

// ============================================================================
// WebSocket
// ============================================================================

async fn live_socket(ws: WebSocketUpgrade, State(state): State<Arc<DevState>>) -> Response {
    ws.on_upgrade(move |socket| forward_updates(socket, state))
}

/// Send `connected`, then every broadcast message, until either side closes.
async fn forward_updates(socket: WebSocket, state: Arc<DevState>) {
    let mut rx = state.subscribe();
    let (mut sender, mut receiver) = socket.split();

    if sender
        .send(Message::Text(state.hello().to_json()))
        .await
        .is_err()
    {
        return;
    }
    tracing::debug!("live client connected");

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(msg) => {
                    if sender.send(Message::Text(msg.to_json())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("live client disconnected");
}

// ============================================================================
// File Watching
// ============================================================================

/// Whether a change to `path` should not trigger a rebuild.
fn should_ignore(path: &Path, skip: &[PathBuf]) -> bool {
    if skip.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }

    let ignored_dir = path.components().any(|c| match c {
        Component::Normal(name) => matches!(name.to_str(), Some("node_modules" | ".git")),
        _ => false,
    });
    if ignored_dir {
        return true;
    }

    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') || name.ends_with('~'))
}

/// Forward relevant change events under `root` into `tx`. Blocks until the
/// receiving side is dropped.
fn watch_files(root: &Path, skip: &[PathBuf], tx: &mpsc::Sender<PathBuf>) -> notify::Result<()> {
    let (events_tx, events_rx) = std::sync::mpsc::channel();
    let mut watcher = RecommendedWatcher::new(events_tx, notify::Config::default())?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::debug!(root = %root.display(), "watching");

    for event in events_rx {
        match event {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    continue;
                }
                for path in event.paths {
                    if should_ignore(&path, skip) {
                        continue;
                    }
                    if tx.blocking_send(path).is_err() {
                        return Ok(());
                    }
                }
            }
            Err(e) => tracing::warn!("watch error: {e}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_router_serves_published_build() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.tsx"), "console.log('served');\n").unwrap();
        let config =
            BuildConfig::load(dir.path(), Mode::Development, &PipelineFlags::default(), None)
                .unwrap();
        let output = Bundler::new(Arc::new(config)).unwrap().build().unwrap();

        let state = Arc::new(DevState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        assert!(get(addr, "/").await.starts_with("HTTP/1.1 503"));

        let generation = state.begin_build();
        assert!(state.publish(generation, &output, Vec::new()));

        let js = get(addr, "/static/js/main.js").await;
        assert!(js.starts_with("HTTP/1.1 200"));
        assert!(js.contains("application/javascript"));
        assert!(js.contains("console.log('served')"));

        let page = get(addr, "/settings/profile").await;
        assert!(page.contains("text/html"));
        assert!(page.contains(CLIENT_PATH));

        let client = get(addr, CLIENT_PATH).await;
        assert!(client.contains(WS_PATH));
    }

    #[test]
    fn test_should_ignore() {
        let skip = vec![PathBuf::from("/app/dist")];
        assert!(should_ignore(Path::new("/app/dist/static/js/main.js"), &skip));
        assert!(should_ignore(Path::new("/app/node_modules/react/index.js"), &skip));
        assert!(should_ignore(Path::new("/app/.git/HEAD"), &skip));
        assert!(should_ignore(Path::new("/app/src/.App.tsx.swp"), &skip));
        assert!(should_ignore(Path::new("/app/src/App.tsx~"), &skip));
        assert!(!should_ignore(Path::new("/app/src/App.tsx"), &skip));
        assert!(!should_ignore(Path::new("/app/distant/a.ts"), &skip));
    }
}
