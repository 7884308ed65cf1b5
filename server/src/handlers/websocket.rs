/// WebSocket handler for real-time message relay.
/// Manages client connections per channel and broadcasts to every peer on
/// the same channel, the sender included.

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Event name relayed on the named-event channel
pub const MESSAGE_EVENT: &str = "message";
pub const ERROR_EVENT: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Bare frames, relayed verbatim
    Raw,
    /// `{"event": .., "data": ..}` envelopes
    Events,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Raw => f.write_str("raw"),
            Channel::Events => f.write_str("events"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

pub struct ClientEntry {
    pub channel: Channel,
    pub tx: tokio::sync::mpsc::UnboundedSender<String>,
}

/// WebSocket server state - manages client connections and routing
///
/// Registration and broadcast are synchronous so frames from one client are
/// relayed in the order they arrived.
pub struct WsServer {
    pub clients: Arc<RwLock<HashMap<String, ClientEntry>>>,
}

impl Default for WsServer {
    fn default() -> Self {
        Self::new()
    }
}

impl WsServer {
    pub fn new() -> Self {
        WsServer {
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a client connection
    pub fn register(
        &self,
        client_id: String,
        channel: Channel,
        tx: tokio::sync::mpsc::UnboundedSender<String>,
    ) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.insert(client_id, ClientEntry { channel, tx });
    }

    /// Unregister a client connection
    pub fn unregister(&self, client_id: &str) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.remove(client_id);
    }

    /// Broadcast to every client on `channel`; returns how many were reached
    pub fn broadcast(&self, channel: Channel, message: &str) -> usize {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients
            .values()
            .filter(|entry| entry.channel == channel)
            .filter(|entry| entry.tx.send(message.to_string()).is_ok())
            .count()
    }

    pub fn client_count(&self, channel: Channel) -> usize {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.values().filter(|entry| entry.channel == channel).count()
    }
}

/// WebSocket actor for individual client connections
pub struct WsActor {
    pub client_id: String,
    pub channel: Channel,
    pub server: web::Data<WsServer>,
}

impl WsActor {
    /// Relay a named-event frame; malformed frames get an error event back
    fn handle_event(&self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::from_str::<EventEnvelope>(text) {
            Ok(envelope) if envelope.event == MESSAGE_EVENT => match serde_json::to_string(&envelope) {
                Ok(frame) => {
                    self.server.broadcast(Channel::Events, &frame);
                }
                Err(e) => log::error!("Failed to encode envelope: {}", e),
            },
            Ok(envelope) => {
                log::debug!("Ignoring event '{}' from {}", envelope.event, self.client_id);
            }
            Err(e) => {
                log::error!("Failed to parse event envelope: {}", e);
                ctx.text(
                    json!({
                        "event": ERROR_EVENT,
                        "data": format!("invalid envelope: {}", e)
                    })
                    .to_string(),
                );
            }
        }
    }
}

impl Actor for WsActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        log::info!("WebSocket connection started: {}", self.client_id);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let addr = ctx.address();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                addr.do_send(OutgoingFrame(msg));
            }
        });

        self.server.register(self.client_id.clone(), self.channel, tx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        log::info!("WebSocket connection stopped: {}", self.client_id);
        self.server.unregister(&self.client_id);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => match self.channel {
                Channel::Raw => {
                    self.server.broadcast(Channel::Raw, &text);
                }
                Channel::Events => self.handle_event(&text, ctx),
            },
            Ok(ws::Message::Binary(bytes)) => {
                log::debug!("Ignoring {} byte binary frame from {}", bytes.len(), self.client_id);
            }
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                log::error!("WebSocket error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct OutgoingFrame(String);

impl Handler<OutgoingFrame> for WsActor {
    type Result = ();

    fn handle(&mut self, msg: OutgoingFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

fn start_actor(
    channel: Channel,
    req: &HttpRequest,
    stream: web::Payload,
    server: web::Data<WsServer>,
) -> actix_web::Result<HttpResponse> {
    let actor = WsActor {
        client_id: format!("{}_{}", channel, uuid::Uuid::new_v4()),
        channel,
        server,
    };
    ws::start(actor, req, stream)
}

/// Raw WebSocket endpoint
/// GET /ws
pub async fn ws_raw(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<WsServer>,
) -> actix_web::Result<HttpResponse> {
    start_actor(Channel::Raw, &req, stream, server)
}

/// Named-event WebSocket endpoint
/// GET /socket
pub async fn ws_events(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<WsServer>,
) -> actix_web::Result<HttpResponse> {
    start_actor(Channel::Events, &req, stream, server)
}
