/// Connection lifecycle state, owned exclusively by a client handle.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        *self == ConnectionState::Closed
    }

    /// True while the handle owns (or is acquiring) a transport resource
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lifecycle state plus the orthogonal error flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Set when a transport error drove the handle to `Closed`
    pub error: Option<String>,
    /// Set when releasing the transport failed during close
    pub teardown_error: Option<String>,
}

impl ConnectionStatus {
    pub fn idle() -> Self {
        ConnectionStatus {
            state: ConnectionState::Idle,
            error: None,
            teardown_error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::idle()
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, &self.teardown_error) {
            (Some(err), _) => write!(f, "{} [error: {}]", self.state, err),
            (None, Some(err)) => write!(f, "{} [teardown: {}]", self.state, err),
            (None, None) => write!(f, "{}", self.state),
        }
    }
}
