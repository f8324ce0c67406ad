//! Development mode: rebuild on change, publish atomically, notify clients.
//!
//! The HTTP and WebSocket transport lives in the CLI; everything here is
//! transport-agnostic so it can be driven from tests.

pub mod client;
pub mod debounce;
pub mod messages;
pub mod session;
pub mod state;

pub use client::client_runtime;
pub use debounce::{next_batch, DEFAULT_DEBOUNCE};
pub use messages::LiveMessage;
pub use session::DevSession;
pub use state::{CycleState, DevState, PublishedBuild, Served, DEFAULT_CHANNEL_CAPACITY};

/// Path of the live-update WebSocket.
pub const WS_PATH: &str = "/__brisk/ws";

/// Path the client runtime is served at.
pub const CLIENT_PATH: &str = "/__brisk/client.js";
