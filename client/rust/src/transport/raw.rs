/// Bare socket transport: every data frame is one message, no reconnection.

use super::{Inbound, Transport, TransportKind};
use crate::error::Result;
use crate::models::Payload;
use tokio_tungstenite::tungstenite::Message as Frame;

#[derive(Debug, Clone, Default)]
pub struct RawSocket;

impl RawSocket {
    pub fn new() -> Self {
        RawSocket
    }
}

impl Transport for RawSocket {
    fn kind(&self) -> TransportKind {
        TransportKind::Raw
    }

    fn encode(&self, payload: &Payload) -> Result<Frame> {
        let frame = match payload {
            Payload::Text(text) => Frame::Text(text.as_str().into()),
            Payload::Json(value) => Frame::Text(serde_json::to_string(value)?.into()),
            Payload::Binary(bytes) => Frame::Binary(bytes.clone().into()),
        };
        Ok(frame)
    }

    fn decode(&self, frame: Frame) -> Inbound {
        match frame {
            Frame::Text(text) => Inbound::Deliver(Payload::Text(text.as_str().to_string())),
            Frame::Binary(bytes) => Inbound::Deliver(Payload::Binary(bytes.to_vec())),
            _ => Inbound::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_text_and_json_as_text_frames() {
        let raw = RawSocket::new();
        assert_eq!(
            raw.encode(&Payload::text("hello")).unwrap(),
            Frame::Text("hello".into())
        );
        assert_eq!(
            raw.encode(&Payload::Json(json!({"a": 1}))).unwrap(),
            Frame::Text(r#"{"a":1}"#.into())
        );
    }

    #[test]
    fn test_encode_binary() {
        let frame = RawSocket::new().encode(&Payload::Binary(vec![1, 2])).unwrap();
        assert_eq!(frame, Frame::Binary(vec![1u8, 2].into()));
    }

    #[test]
    fn test_decode_delivers_every_data_frame() {
        let raw = RawSocket::new();
        assert_eq!(
            raw.decode(Frame::Text("{\"not\":\"parsed\"}".into())),
            Inbound::Deliver(Payload::text("{\"not\":\"parsed\"}"))
        );
        assert_eq!(
            raw.decode(Frame::Binary(vec![9u8].into())),
            Inbound::Deliver(Payload::Binary(vec![9]))
        );
    }

    #[test]
    fn test_no_reconnect_policy() {
        assert!(RawSocket::new().reconnect_policy().is_none());
    }
}
