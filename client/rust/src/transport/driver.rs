/// Connection task: owns the socket for one client handle.
///
/// Dials the endpoint, pumps frames between the socket and the session, and
/// releases the socket on every exit path. Re-dial only happens when the
/// transport carries a reconnect policy.

use super::{Inbound, Transport};
use crate::models::{Endpoint, Payload};
use crate::services::session::Session;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message as Frame};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(crate) struct DriverConfig {
    pub endpoint: Endpoint,
    pub greeting: Option<Payload>,
    pub close_timeout: Duration,
}

/// How one connected period ended
enum Exit {
    /// Local close; carries the teardown failure, if any
    Shutdown(Option<String>),
    RemoteClosed,
    /// Transport error; eligible for re-dial
    Fault(String),
    /// Peer-reported error; terminal
    Rejected(String),
}

/// Marks the session closed if the task ends before finishing teardown,
/// including when the runtime drops the task.
struct TeardownGuard(Arc<Session>);

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.0
            .abandon("connection task ended before teardown completed");
    }
}

pub(crate) async fn run<T: Transport>(
    session: Arc<Session>,
    transport: Arc<T>,
    config: DriverConfig,
    mut outbound_rx: mpsc::UnboundedReceiver<Frame>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let _guard = TeardownGuard(session.clone());
    let id = session.id();
    let mut attempt: u32 = 0;

    loop {
        log::debug!("[{}] dialing {} ({})", id, config.endpoint, transport.kind());
        let dialed = tokio::select! {
            _ = &mut shutdown_rx => {
                session.mark_closed(None);
                return;
            }
            result = connect_async(config.endpoint.as_str()) => result,
        };

        let error = match dialed {
            Ok((socket, _)) => {
                if !session.mark_open() {
                    // Closed while the handshake was in flight
                    session.mark_closed(release(socket, config.close_timeout).await);
                    return;
                }
                attempt = 0;
                log::info!("[{}] connected to {}", id, config.endpoint);
                greet(&session, &*transport, config.greeting.as_ref());

                match pump(
                    &session,
                    &*transport,
                    socket,
                    &mut outbound_rx,
                    &mut shutdown_rx,
                    config.close_timeout,
                )
                .await
                {
                    Exit::Shutdown(teardown_error) => {
                        log::info!("[{}] connection closed", id);
                        session.mark_closed(teardown_error);
                        return;
                    }
                    Exit::RemoteClosed => {
                        log::info!("[{}] connection closed by peer", id);
                        session.mark_closed(None);
                        return;
                    }
                    Exit::Rejected(reason) => {
                        session.fail(format!("peer reported error: {}", reason));
                        return;
                    }
                    Exit::Fault(error) => error,
                }
            }
            Err(e) => format!("failed to connect to {}: {}", config.endpoint, e),
        };

        let policy = match transport.reconnect_policy() {
            Some(policy) if attempt < policy.max_attempts => policy,
            Some(policy) => {
                session.fail(format!(
                    "{} (gave up after {} reconnection attempts)",
                    error, policy.max_attempts
                ));
                return;
            }
            None => {
                session.fail(error);
                return;
            }
        };

        let delay = policy.delay(attempt);
        attempt += 1;
        if !session.mark_reconnecting() {
            return;
        }
        log::warn!(
            "[{}] {}; reconnection attempt {} in {:?}",
            id,
            error,
            attempt,
            delay
        );

        tokio::select! {
            _ = &mut shutdown_rx => {
                session.mark_closed(None);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Queue the configured greeting through the normal send path
fn greet<T: Transport>(session: &Session, transport: &T, greeting: Option<&Payload>) {
    let Some(payload) = greeting else {
        return;
    };
    let queued = transport
        .encode(payload)
        .and_then(|frame| session.send(payload.clone(), frame));
    match queued {
        Ok(()) => log::info!("[{}] greeting sent", session.id()),
        Err(e) => log::warn!("[{}] greeting not sent: {}", session.id(), e),
    }
}

async fn pump<T: Transport>(
    session: &Session,
    transport: &T,
    socket: Socket,
    outbound_rx: &mut mpsc::UnboundedReceiver<Frame>,
    shutdown_rx: &mut oneshot::Receiver<()>,
    close_timeout: Duration,
) -> Exit {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            biased;

            _ = &mut *shutdown_rx => {
                return Exit::Shutdown(release_split(write, read, close_timeout).await);
            }
            outgoing = outbound_rx.recv() => match outgoing {
                Some(frame) => {
                    if let Err(e) = write.send(frame).await {
                        return Exit::Fault(format!("send failed: {}", e));
                    }
                }
                // Sender dropped by close(); the shutdown signal is on its way
                None => return Exit::Shutdown(release_split(write, read, close_timeout).await),
            },
            incoming = read.next() => match incoming {
                Some(Ok(frame @ (Frame::Text(_) | Frame::Binary(_)))) => {
                    match transport.decode(frame) {
                        Inbound::Deliver(payload) => {
                            session.deliver(payload);
                        }
                        Inbound::Fault(reason) => {
                            if let Some(error) = release_split(write, read, close_timeout).await {
                                log::warn!("[{}] teardown failed: {}", session.id(), error);
                            }
                            return Exit::Rejected(reason);
                        }
                        Inbound::Ignore => {}
                    }
                }
                Some(Ok(Frame::Close(frame))) => {
                    log::debug!("[{}] close frame received: {:?}", session.id(), frame);
                    return Exit::RemoteClosed;
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => return Exit::Fault(format!("connection lost: {}", e)),
                None => return Exit::RemoteClosed,
            },
        }
    }
}

async fn release(socket: Socket, close_timeout: Duration) -> Option<String> {
    let (write, read) = socket.split();
    release_split(write, read, close_timeout).await
}

/// Send a close frame and drop the socket. Returns the teardown failure, if any.
async fn release_split(
    mut write: SplitSink<Socket, Frame>,
    read: SplitStream<Socket>,
    close_timeout: Duration,
) -> Option<String> {
    let result = tokio::time::timeout(close_timeout, write.close()).await;
    drop(read);
    match result {
        Ok(Ok(())) => None,
        Ok(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => None,
        Ok(Err(e)) => Some(format!("close handshake failed: {}", e)),
        Err(_) => Some(format!("close handshake timed out after {:?}", close_timeout)),
    }
}
