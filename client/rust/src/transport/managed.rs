/// Managed socket transport: named events over JSON envelopes, with
/// transparent re-dial after transport errors.
///
/// Wire format, both directions:
///
/// ```json
/// {"event": "message", "data": "Hello"}
/// ```
///
/// Only events named like the subscribed event are delivered. A peer-sent
/// `"error"` event is terminal for the handle.

use super::{Inbound, ReconnectPolicy, Transport, TransportKind};
use crate::error::{ClientError, Result};
use crate::models::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as Frame;

pub const DEFAULT_EVENT: &str = "message";
pub const ERROR_EVENT: &str = "error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl EventEnvelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        EventEnvelope {
            event: event.into(),
            data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManagedSocket {
    event: String,
    reconnect: ReconnectPolicy,
}

impl Default for ManagedSocket {
    fn default() -> Self {
        ManagedSocket {
            event: DEFAULT_EVENT.to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ManagedSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event name used for both emit and delivery
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn event(&self) -> &str {
        &self.event
    }
}

impl Transport for ManagedSocket {
    fn kind(&self) -> TransportKind {
        TransportKind::Managed
    }

    fn encode(&self, payload: &Payload) -> Result<Frame> {
        let data = match payload {
            Payload::Text(text) => Value::String(text.clone()),
            Payload::Json(value) => value.clone(),
            Payload::Binary(_) => {
                return Err(ClientError::UnsupportedPayload(
                    "managed socket events carry text or JSON only".to_string(),
                ))
            }
        };
        let envelope = EventEnvelope::new(self.event.clone(), data);
        Ok(Frame::Text(serde_json::to_string(&envelope)?.into()))
    }

    fn decode(&self, frame: Frame) -> Inbound {
        let text = match frame {
            Frame::Text(text) => text,
            _ => {
                log::debug!("managed socket ignoring non-text frame");
                return Inbound::Ignore;
            }
        };

        match serde_json::from_str::<EventEnvelope>(text.as_str()) {
            Ok(envelope) if envelope.event == self.event => {
                Inbound::Deliver(Payload::from_value(envelope.data))
            }
            Ok(envelope) if envelope.event == ERROR_EVENT => {
                let reason = match envelope.data {
                    Value::String(reason) => reason,
                    other => other.to_string(),
                };
                Inbound::Fault(reason)
            }
            Ok(envelope) => {
                log::debug!("managed socket ignoring event '{}'", envelope.event);
                Inbound::Ignore
            }
            Err(e) => {
                log::warn!("managed socket received malformed envelope: {}", e);
                Inbound::Ignore
            }
        }
    }

    fn reconnect_policy(&self) -> Option<&ReconnectPolicy> {
        (self.reconnect.max_attempts > 0).then_some(&self.reconnect)
    }
}
