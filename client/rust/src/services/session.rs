/// Shared lifecycle state for one client handle.
///
/// The session is the single owner of the connection status. The handle and
/// its connection task both hold it; every state change goes through the
/// methods below while the session lock is held, and is then published on
/// the status watch channel.

use crate::error::{ClientError, Result};
use crate::models::{ConnectionState, ConnectionStatus, Direction, Message, Payload, SessionId};
use crate::services::message_store::MessageStore;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message as Frame;

/// Item pushed to inbound stream subscribers
#[derive(Debug)]
pub(crate) enum StreamEvent {
    Message(Message),
    /// Terminal transport error; the subscriber's channel closes right after.
    Failed(String),
}

#[derive(Default)]
struct SessionInner {
    status: ConnectionStatus,
    subscribers: Vec<mpsc::UnboundedSender<StreamEvent>>,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl SessionInner {
    /// Drop every channel into and out of the connection task
    fn release_channels(&mut self) {
        self.subscribers.clear();
        self.outbound = None;
        self.shutdown = None;
    }
}

pub(crate) struct Session {
    id: SessionId,
    store: MessageStore,
    log_outbound: bool,
    inner: Mutex<SessionInner>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl Session {
    pub(crate) fn new(store: MessageStore, log_outbound: bool) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::idle());
        Session {
            id: SessionId::new(),
            store,
            log_outbound,
            inner: Mutex::new(SessionInner::default()),
            status_tx,
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn store(&self) -> &MessageStore {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &SessionInner) {
        self.status_tx.send_replace(inner.status.clone());
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        self.lock().status.clone()
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().status.state
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Idle -> Connecting. Returns `Ok(false)` when a connection is already
    /// active, so a repeated open never allocates a second transport. Once
    /// close has been requested the handle cannot be reopened.
    pub(crate) fn begin_open(
        &self,
        outbound: mpsc::UnboundedSender<Frame>,
        shutdown: oneshot::Sender<()>,
    ) -> Result<bool> {
        let mut inner = self.lock();
        match inner.status.state {
            ConnectionState::Idle => {
                inner.outbound = Some(outbound);
                inner.shutdown = Some(shutdown);
                inner.status.state = ConnectionState::Connecting;
                self.publish(&inner);
                Ok(true)
            }
            ConnectionState::Connecting | ConnectionState::Open => Ok(false),
            ConnectionState::Closing | ConnectionState::Closed => Err(ClientError::HandleClosed),
        }
    }

    /// Connecting -> Open (transport ack). False if the handle is being closed.
    pub(crate) fn mark_open(&self) -> bool {
        let mut inner = self.lock();
        if inner.status.state != ConnectionState::Connecting {
            return false;
        }
        inner.status.state = ConnectionState::Open;
        self.publish(&inner);
        true
    }

    /// Back to Connecting while a transport re-dials underneath the handle
    pub(crate) fn mark_reconnecting(&self) -> bool {
        let mut inner = self.lock();
        match inner.status.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                inner.status.state = ConnectionState::Connecting;
                self.publish(&inner);
                true
            }
            _ => false,
        }
    }

    /// Append an inbound payload and fan it out to subscribers.
    /// Rejected unless the handle is Open.
    pub(crate) fn deliver(&self, payload: Payload) -> bool {
        let mut inner = self.lock();
        if inner.status.state != ConnectionState::Open {
            log::debug!("[{}] dropping inbound payload in state {}", self.id, inner.status.state);
            return false;
        }

        let message = self.store.append(Direction::Inbound, payload);
        inner
            .subscribers
            .retain(|tx| tx.send(StreamEvent::Message(message.clone())).is_ok());
        true
    }

    /// Queue an encoded frame for the connection task
    pub(crate) fn send(&self, payload: Payload, frame: Frame) -> Result<()> {
        let inner = self.lock();
        if inner.status.state != ConnectionState::Open {
            return Err(ClientError::NotConnected);
        }
        let outbound = inner.outbound.as_ref().ok_or(ClientError::NotConnected)?;
        outbound.send(frame).map_err(|_| ClientError::NotConnected)?;

        if self.log_outbound {
            self.store.append(Direction::Outbound, payload);
        }
        Ok(())
    }

    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        if inner.status.state == ConnectionState::Closed {
            if let Some(error) = &inner.status.error {
                let _ = tx.send(StreamEvent::Failed(error.clone()));
            }
        } else {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Start teardown. Returns false when the handle was already closing or closed.
    pub(crate) fn begin_close(&self) -> bool {
        let mut inner = self.lock();
        match inner.status.state {
            ConnectionState::Idle => {
                inner.status.state = ConnectionState::Closed;
                inner.release_channels();
                self.publish(&inner);
                true
            }
            ConnectionState::Connecting | ConnectionState::Open => {
                inner.status.state = ConnectionState::Closing;
                if let Some(shutdown) = inner.shutdown.take() {
                    let _ = shutdown.send(());
                }
                // Ends every inbound stream; no append is accepted past this point
                inner.subscribers.clear();
                inner.outbound = None;
                self.publish(&inner);
                true
            }
            ConnectionState::Closing | ConnectionState::Closed => false,
        }
    }

    /// Terminal transport error: Closed with the error flag set
    pub(crate) fn fail(&self, error: String) {
        let mut inner = self.lock();
        if inner.status.state == ConnectionState::Closed {
            return;
        }
        log::error!("[{}] connection failed: {}", self.id, error);

        for tx in inner.subscribers.drain(..) {
            let _ = tx.send(StreamEvent::Failed(error.clone()));
        }
        inner.status.state = ConnectionState::Closed;
        inner.status.error = Some(error);
        inner.release_channels();
        self.publish(&inner);
    }

    /// Transport resource released; records a teardown failure if any
    pub(crate) fn mark_closed(&self, teardown_error: Option<String>) {
        let mut inner = self.lock();
        if inner.status.state == ConnectionState::Closed {
            return;
        }
        if let Some(error) = &teardown_error {
            log::warn!("[{}] teardown failed: {}", self.id, error);
        }
        inner.status.state = ConnectionState::Closed;
        inner.status.teardown_error = teardown_error;
        inner.release_channels();
        self.publish(&inner);
    }

    /// The connection task is gone without finishing its own teardown
    pub(crate) fn abandon(&self, reason: &str) {
        match self.state() {
            ConnectionState::Closed => {}
            ConnectionState::Closing => self.mark_closed(Some(reason.to_string())),
            _ => self.fail(reason.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened_session() -> (Session, mpsc::UnboundedReceiver<Frame>, oneshot::Receiver<()>) {
        let session = Session::new(MessageStore::new(), false);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        assert!(session.begin_open(out_tx, shutdown_tx).unwrap());
        assert!(session.mark_open());
        (session, out_rx, shutdown_rx)
    }

    fn texts(session: &Session) -> Vec<String> {
        session
            .store()
            .snapshot()
            .into_iter()
            .map(|m| m.payload.to_string())
            .collect()
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new(MessageStore::new(), false);
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_deliver_in_order() {
        let (session, _out, _shutdown) = opened_session();
        let mut rx = session.subscribe();

        for text in ["a", "b", "c"] {
            assert!(session.deliver(text.into()));
        }

        assert_eq!(texts(&session), vec!["a", "b", "c"]);
        for expected in ["a", "b", "c"] {
            match rx.try_recv().unwrap() {
                StreamEvent::Message(m) => assert_eq!(m.payload.to_string(), expected),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_deliver_rejected_unless_open() {
        let session = Session::new(MessageStore::new(), false);
        assert!(!session.deliver("early".into()));
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_second_open_is_noop() {
        let (session, _out, _shutdown) = opened_session();
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        assert!(!session.begin_open(out_tx, shutdown_tx).unwrap());
        assert_eq!(session.state(), ConnectionState::Open);
    }

    #[test]
    fn test_send_reaches_outbound_only_when_open() {
        let session = Session::new(MessageStore::new(), false);
        let err = session.send("x".into(), Frame::Text("x".into())).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));

        let (session, mut out, _shutdown) = opened_session();
        session.send("y".into(), Frame::Text("y".into())).unwrap();
        assert_eq!(out.try_recv().unwrap(), Frame::Text("y".into()));
        assert!(session.store().is_empty(), "outbound not logged by default");
    }

    #[test]
    fn test_send_logs_outbound_when_enabled() {
        let session = Session::new(MessageStore::new(), true);
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        session.begin_open(out_tx, shutdown_tx).unwrap();
        session.mark_open();

        session.send("hi".into(), Frame::Text("hi".into())).unwrap();
        let snapshot = session.store().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].direction, Direction::Outbound);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (session, _out, mut shutdown) = opened_session();
        let mut watch = session.watch();

        assert!(session.begin_close());
        assert_eq!(session.state(), ConnectionState::Closing);
        assert!(shutdown.try_recv().is_ok(), "shutdown signalled to the task");

        session.mark_closed(None);
        assert!(!session.begin_close());
        assert!(!session.begin_close());
        assert_eq!(session.state(), ConnectionState::Closed);
        assert!(!session.mark_open(), "never re-enters Open");
        assert!(watch.has_changed().unwrap());
        assert_eq!(watch.borrow_and_update().state, ConnectionState::Closed);
    }

    #[test]
    fn test_open_while_closing_is_rejected() {
        let (session, _out, _shutdown) = opened_session();
        session.begin_close();

        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        let reopen = session.begin_open(out_tx, shutdown_tx);
        assert!(matches!(reopen, Err(ClientError::HandleClosed)));
        assert_eq!(session.state(), ConnectionState::Closing);
    }

    #[test]
    fn test_dropped_streams_pruned_on_subscribe() {
        let (session, _out, _shutdown) = opened_session();
        for _ in 0..100 {
            drop(session.subscribe());
        }
        let _live = session.subscribe();
        assert_eq!(session.lock().subscribers.len(), 1);
    }

    #[test]
    fn test_close_from_idle_goes_straight_to_closed() {
        let session = Session::new(MessageStore::new(), false);
        assert!(session.begin_close());
        assert_eq!(session.state(), ConnectionState::Closed);

        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        let reopen = session.begin_open(out_tx, shutdown_tx);
        assert!(matches!(reopen, Err(ClientError::HandleClosed)));
    }

    #[test]
    fn test_close_stops_appends_and_ends_streams() {
        let (session, _out, _shutdown) = opened_session();
        let mut rx = session.subscribe();
        session.deliver("before".into());
        session.begin_close();

        assert!(!session.deliver("after".into()));
        assert_eq!(texts(&session), vec!["before"]);
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::Message(_))));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_fail_sets_error_and_signals_streams() {
        let (session, _out, _shutdown) = opened_session();
        let mut rx = session.subscribe();
        session.fail("reset by peer".to_string());

        let status = session.status();
        assert_eq!(status.state, ConnectionState::Closed);
        assert_eq!(status.error.as_deref(), Some("reset by peer"));
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::Failed(e)) if e == "reset by peer"));
        assert!(!session.deliver("late".into()));

        // Late subscribers still observe the terminal error
        let mut late = session.subscribe();
        assert!(matches!(late.try_recv(), Ok(StreamEvent::Failed(_))));
    }

    #[test]
    fn test_reconnecting_returns_to_connecting() {
        let (session, _out, _shutdown) = opened_session();
        assert!(session.mark_reconnecting());
        assert_eq!(session.state(), ConnectionState::Connecting);
        assert!(session.mark_open());

        session.begin_close();
        assert!(!session.mark_reconnecting());
    }

    #[test]
    fn test_abandon_while_closing_records_teardown_error() {
        let (session, _out, _shutdown) = opened_session();
        session.begin_close();
        session.abandon("task stopped");

        let status = session.status();
        assert_eq!(status.state, ConnectionState::Closed);
        assert!(status.error.is_none());
        assert_eq!(status.teardown_error.as_deref(), Some("task stopped"));
    }
}
