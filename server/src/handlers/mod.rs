/// HTTP handlers module
/// Provides REST and WebSocket endpoints

pub mod rest;
pub mod websocket;

pub use rest::health;
pub use websocket::{ws_events, ws_raw, Channel, EventEnvelope, WsServer};
