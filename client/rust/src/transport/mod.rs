//! Transport variants behind the connection manager.
//!
//! A [`Transport`] decides how payloads map onto WebSocket frames and
//! whether a dropped connection is re-dialled. The lifecycle itself (state
//! machine, store appends, teardown) lives in
//! [`ClientHandle`](crate::services::ClientHandle) and is identical for
//! every variant.
//!
//! | Variant | Framing | Reconnection |
//! |---|---|---|
//! | [`ManagedSocket`] | named events, `{"event": .., "data": ..}` | exponential backoff |
//! | [`RawSocket`] | one frame per message | none |

pub(crate) mod driver;
pub mod managed;
pub mod raw;

pub use managed::{EventEnvelope, ManagedSocket};
pub use raw::RawSocket;

use crate::error::Result;
use crate::models::Payload;
use std::fmt;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Managed,
    Raw,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Managed => f.write_str("managed"),
            TransportKind::Raw => f.write_str("raw"),
        }
    }
}

/// What a transport made of one inbound data frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Append to the store and surface to subscribers
    Deliver(Payload),
    /// Peer reported an error; terminal for the handle
    Fault(String),
    /// Not addressed to this handle
    Ignore,
}

pub trait Transport: Send + Sync + 'static {
    fn kind(&self) -> TransportKind;

    /// Encode an outbound payload into a frame
    fn encode(&self, payload: &Payload) -> Result<Frame>;

    /// Decode a text or binary frame. Control frames never reach this.
    fn decode(&self, frame: Frame) -> Inbound;

    /// Re-dial policy after a transport error; `None` means a failed
    /// connection stays closed.
    fn reconnect_policy(&self) -> Option<&ReconnectPolicy> {
        None
    }
}

/// Exponential backoff for transports that re-dial on their own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        ReconnectPolicy {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before re-dial number `attempt` (zero based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            max_attempts: 12,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(32),
        }
    }
}
