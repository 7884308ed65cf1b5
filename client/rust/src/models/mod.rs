/// Data models for the dashfeed client.
/// Defines messages, payloads, connection status and endpoints.

pub mod endpoint;
pub mod message;
pub mod state;

pub use endpoint::Endpoint;
pub use message::{Direction, Message, Payload};
pub use state::{ConnectionState, ConnectionStatus};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one client handle (one connection session)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}
