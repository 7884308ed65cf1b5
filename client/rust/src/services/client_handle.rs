/// Client handle: one connection session over a chosen transport.
///
/// The handle is the sole owner of its transport resource (through the
/// connection task it spawns) and of its message store. Dropping the handle
/// closes the connection.

use crate::error::{ClientError, Result};
use crate::models::{ConnectionState, ConnectionStatus, Endpoint, Message, Payload, SessionId};
use crate::services::connection_manager::{ConnectionManager, MessageStream};
use crate::services::message_store::MessageStore;
use crate::services::session::Session;
use crate::transport::driver::{self, DriverConfig};
use crate::transport::{ManagedSocket, RawSocket, Transport, TransportKind};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Per-handle settings that do not depend on the transport
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Append outbound payloads to the store, tagged as outbound
    pub log_outbound: bool,
    /// Bounded store capacity; `None` keeps every message
    pub store_capacity: Option<usize>,
    /// Sent every time the connection opens
    pub greeting: Option<Payload>,
    /// Upper bound on the close handshake
    pub close_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            log_outbound: false,
            store_capacity: None,
            greeting: None,
            close_timeout: Duration::from_secs(5),
        }
    }
}

pub struct ClientHandle<T: Transport> {
    session: Arc<Session>,
    transport: Arc<T>,
    options: ClientOptions,
}

pub type ManagedSocketClient = ClientHandle<ManagedSocket>;
pub type RawSocketClient = ClientHandle<RawSocket>;

impl ClientHandle<ManagedSocket> {
    pub fn managed(options: ClientOptions) -> Self {
        Self::new(ManagedSocket::default(), options)
    }
}

impl ClientHandle<RawSocket> {
    pub fn raw(options: ClientOptions) -> Self {
        Self::new(RawSocket, options)
    }
}

impl<T: Transport> ClientHandle<T> {
    /// Create an idle handle
    pub fn new(transport: T, options: ClientOptions) -> Self {
        let store = MessageStore::with_capacity(options.store_capacity);
        ClientHandle {
            session: Arc::new(Session::new(store, options.log_outbound)),
            transport: Arc::new(transport),
            options,
        }
    }

    /// Create a handle and open it against `endpoint`
    pub fn connect(endpoint: &Endpoint, transport: T, options: ClientOptions) -> Result<Self> {
        let handle = Self::new(transport, options);
        handle.open(endpoint)?;
        Ok(handle)
    }

    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Idle -> Connecting, spawning the connection task on the current runtime.
    ///
    /// Repeated calls while connecting or open are no-ops. Once `close` has
    /// been called the handle returns `HandleClosed`.
    pub fn open(&self, endpoint: &Endpoint) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ClientError::Connection(format!("no async runtime: {}", e)))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        if !self.session.begin_open(outbound_tx, shutdown_tx)? {
            log::debug!("[{}] open ignored, connection already active", self.id());
            return Ok(());
        }

        log::info!(
            "[{}] opening {} connection to {}",
            self.id(),
            self.transport.kind(),
            endpoint
        );
        let config = DriverConfig {
            endpoint: endpoint.clone(),
            greeting: self.options.greeting.clone(),
            close_timeout: self.options.close_timeout,
        };
        runtime.spawn(driver::run(
            self.session.clone(),
            self.transport.clone(),
            config,
            outbound_rx,
            shutdown_rx,
        ));
        Ok(())
    }

    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        send_via(&self.session, &*self.transport, payload.into())
    }

    pub fn on_message(&self) -> MessageStream {
        MessageStream::new(self.session.subscribe())
    }

    /// Begin teardown. Idempotent; completion is observable via `closed()`.
    pub fn close(&self) {
        if self.session.begin_close() {
            log::info!("[{}] closing", self.id());
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.status()
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.session.watch()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.session.store().snapshot()
    }

    /// Explicitly clear the message store
    pub fn reset_messages(&self) {
        self.session.store().reset();
    }

    /// Non-owning reference for issuing sends
    pub fn sender(&self) -> SendHandle<T> {
        SendHandle {
            session: Arc::downgrade(&self.session),
            transport: self.transport.clone(),
        }
    }

    /// Wait until the handle is open. Fails if it closes first.
    pub async fn wait_open(&self) -> Result<()> {
        let mut rx = self.session.watch();
        let status = rx
            .wait_for(|s| matches!(s.state, ConnectionState::Open | ConnectionState::Closed))
            .await
            .map_err(|_| ClientError::NotConnected)?
            .clone();

        match (status.state, status.error) {
            (ConnectionState::Open, _) => Ok(()),
            (_, Some(error)) => Err(ClientError::Connection(error)),
            (_, None) => Err(ClientError::NotConnected),
        }
    }

    /// Wait until teardown has completed, reporting a failed release.
    pub async fn closed(&self) -> Result<()> {
        let mut rx = self.session.watch();
        let status = rx
            .wait_for(|s| s.state == ConnectionState::Closed)
            .await
            .map_err(|_| ClientError::Teardown("status channel closed".to_string()))?
            .clone();

        match status.teardown_error {
            Some(error) => Err(ClientError::Teardown(error)),
            None => Ok(()),
        }
    }
}

impl<T: Transport> Drop for ClientHandle<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> ConnectionManager for ClientHandle<T> {
    fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    fn open(&self, endpoint: &Endpoint) -> Result<()> {
        ClientHandle::open(self, endpoint)
    }

    fn send(&self, payload: Payload) -> Result<()> {
        ClientHandle::send(self, payload)
    }

    fn on_message(&self) -> MessageStream {
        ClientHandle::on_message(self)
    }

    fn close(&self) {
        ClientHandle::close(self)
    }

    fn status(&self) -> ConnectionStatus {
        ClientHandle::status(self)
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        ClientHandle::watch_status(self)
    }

    fn snapshot(&self) -> Vec<Message> {
        ClientHandle::snapshot(self)
    }

    fn reset_messages(&self) {
        ClientHandle::reset_messages(self)
    }
}

/// Send-only view of a handle. Does not keep the connection alive.
pub struct SendHandle<T: Transport> {
    session: Weak<Session>,
    transport: Arc<T>,
}

impl<T: Transport> Clone for SendHandle<T> {
    fn clone(&self) -> Self {
        SendHandle {
            session: self.session.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: Transport> SendHandle<T> {
    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        let session = self.session.upgrade().ok_or(ClientError::NotConnected)?;
        send_via(&session, &*self.transport, payload.into())
    }

    pub fn state(&self) -> ConnectionState {
        self.session
            .upgrade()
            .map(|session| session.state())
            .unwrap_or(ConnectionState::Closed)
    }
}

fn send_via<T: Transport>(session: &Session, transport: &T, payload: Payload) -> Result<()> {
    // State is checked first so a closed handle never touches the transport
    if session.state() != ConnectionState::Open {
        return Err(ClientError::NotConnected);
    }
    let frame = transport.encode(&payload)?;
    session.send(payload, frame)
}
