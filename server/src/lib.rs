/// Dashfeed relay server library
/// Raw and named-event WebSocket endpoints that broadcast to connected peers

pub mod config;
pub mod handlers;
pub mod server;
