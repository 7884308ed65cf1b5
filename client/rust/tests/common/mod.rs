//! Common test utilities for client integration tests
//! Provides a scripted WebSocket peer for fault injection and a relay launcher

#![allow(dead_code)]

use dashfeed_client::{ConnectionState, ConnectionStatus, Endpoint};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// What the scripted peer does on each accepted connection
#[derive(Debug, Clone)]
pub enum Step {
    Send(String),
    Pause(u64),
    /// Orderly close handshake
    Close,
    /// Drop the TCP connection without a close frame
    Drop,
}

/// A WebSocket peer that plays the same script on every connection and
/// then records incoming text frames until the client goes away.
pub struct ScriptedServer {
    pub addr: SocketAddr,
    pub accepted: Arc<AtomicUsize>,
    pub finished: Arc<AtomicUsize>,
    pub received: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    pub async fn start(steps: Vec<Step>) -> Self {
        Self::start_limited(steps, None).await
    }

    /// Stop listening after `max_connections` accepts, so later dials are refused
    pub async fn start_limited(steps: Vec<Step>, max_connections: Option<usize>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let accepted = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));

        let server = ScriptedServer {
            addr,
            accepted: accepted.clone(),
            finished: finished.clone(),
            received: received.clone(),
        };

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let count = accepted.fetch_add(1, Ordering::SeqCst) + 1;

                let steps = steps.clone();
                let received = received.clone();
                let finished = finished.clone();
                tokio::spawn(async move {
                    play(stream, steps, received).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                });

                if max_connections.is_some_and(|max| count >= max) {
                    break;
                }
            }
            // Listener dropped here: further dials are refused
        });

        server
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::parse(&format!("ws://{}", self.addr)).expect("valid endpoint")
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

async fn play(stream: tokio::net::TcpStream, steps: Vec<Step>, received: Arc<Mutex<Vec<String>>>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    for step in steps {
        match step {
            Step::Send(text) => {
                if ws.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            Step::Pause(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            Step::Close => {
                let _ = ws.close(None).await;
                while let Some(Ok(_)) = ws.next().await {}
                return;
            }
            Step::Drop => return,
        }
    }

    while let Some(Ok(frame)) = ws.next().await {
        if let Message::Text(text) = frame {
            received.lock().unwrap().push(text.as_str().to_string());
        }
    }
}

/// Managed-socket envelope for a "message" event
pub fn event(data: serde_json::Value) -> String {
    serde_json::json!({"event": "message", "data": data}).to_string()
}

/// An address nothing listens on
pub async fn refused_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);
    Endpoint::parse(&format!("ws://{}", addr)).expect("valid endpoint")
}

/// Start the relay server on a random port and return its address
pub async fn spawn_relay() -> String {
    let (server, addr) = dashfeed_server::server::create_test_http_server()
        .expect("Failed to create test server");
    tokio::spawn(server);

    // Give server a moment to bind
    tokio::time::sleep(Duration::from_millis(100)).await;
    addr
}

/// Poll `condition` until it holds or the test timeout expires
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met before timeout");
}

/// Wait for the handle to reach Closed and return the final status
pub async fn wait_closed(mut status: watch::Receiver<ConnectionStatus>) -> ConnectionStatus {
    let closed = tokio::time::timeout(TIMEOUT, status.wait_for(|s| s.state == ConnectionState::Closed))
        .await
        .expect("handle did not close before timeout")
        .expect("status channel open")
        .clone();
    closed
}
