//! Logging initialization for the CLI.
//!
//! Logging is owned by the CLI crate; `brisk-core` only emits `tracing` events.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `verbosity` 0 = INFO, 1 = DEBUG, 2+ = TRACE for brisk's own targets.
/// `RUST_LOG` sets the baseline for everything else (default `warn`). With
/// `json`, each event is one JSON line on stderr:
///
/// ```json
/// {"timestamp":"...","level":"INFO","fields":{"message":"build finished","assets":4},"target":"brisk_core::bundler"}
/// ```
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    for target in ["brisk", "brisk_core"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
