//! Live-update protocol messages (server → client, JSON text frames).

use serde::{Deserialize, Serialize};

/// A message broadcast to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    /// Sent once per connection, with the generation being served.
    Connected { generation: u64 },
    /// A new build was published.
    Update {
        generation: u64,
        /// Affected modules (project-relative), in rebuild order.
        modules: Vec<String>,
    },
    /// A build failed; the previous build keeps serving.
    Error { generation: u64, message: String },
}

impl LiveMessage {
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.to_string())
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::Connected { generation }
            | Self::Update { generation, .. }
            | Self::Error { generation, .. } => *generation,
        }
    }
}
