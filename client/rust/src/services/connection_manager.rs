/// Transport-agnostic connection contract and the inbound message stream.
///
/// The presentation layer talks to a `dyn ConnectionManager` and does not
/// know which transport variant sits behind it.

use crate::error::{ClientError, Result};
use crate::models::{ConnectionStatus, Endpoint, Message, Payload};
use crate::services::session::StreamEvent;
use crate::transport::TransportKind;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};

pub trait ConnectionManager: Send + Sync {
    fn transport_kind(&self) -> TransportKind;

    /// Start a connection attempt. A no-op while one is already active.
    fn open(&self, endpoint: &Endpoint) -> Result<()>;

    /// Transmit a payload. Fails with `NotConnected` unless the handle is open.
    fn send(&self, payload: Payload) -> Result<()>;

    /// Ordered stream of inbound messages, ending when the handle closes
    fn on_message(&self) -> MessageStream;

    /// Release the connection. Safe to call any number of times.
    fn close(&self);

    fn status(&self) -> ConnectionStatus;

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus>;

    /// Store contents at call time
    fn snapshot(&self) -> Vec<Message>;

    /// Explicitly clear the store
    fn reset_messages(&self);
}

/// Inbound messages in arrival order.
///
/// Yields `Err(ClientError::Connection)` once if the connection failed, then
/// ends. Ends without an error after an orderly close.
#[derive(Debug)]
pub struct MessageStream {
    rx: Option<mpsc::UnboundedReceiver<StreamEvent>>,
}

impl MessageStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<StreamEvent>) -> Self {
        MessageStream { rx: Some(rx) }
    }

    pub fn is_terminated(&self) -> bool {
        self.rx.is_none()
    }
}

impl Stream for MessageStream {
    type Item = Result<Message>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(None);
        };

        match rx.poll_recv(cx) {
            Poll::Ready(Some(StreamEvent::Message(message))) => Poll::Ready(Some(Ok(message))),
            Poll::Ready(Some(StreamEvent::Failed(error))) => {
                this.rx = None;
                Poll::Ready(Some(Err(ClientError::Connection(error))))
            }
            Poll::Ready(None) => {
                this.rx = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_yields_in_order_then_ends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = MessageStream::new(rx);

        tx.send(StreamEvent::Message(Message::new(0, Direction::Inbound, "a".into())))
            .unwrap();
        tx.send(StreamEvent::Message(Message::new(1, Direction::Inbound, "b".into())))
            .unwrap();
        drop(tx);

        let seqs: Vec<u64> = stream
            .by_ref()
            .map(|item| item.unwrap().seq)
            .collect()
            .await;
        assert_eq!(seqs, vec![0, 1]);
        assert!(stream.is_terminated());
    }

    #[tokio::test]
    async fn test_stream_terminates_after_failure() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = MessageStream::new(rx);

        tx.send(StreamEvent::Failed("boom".to_string())).unwrap();
        // Anything after the terminal signal is never surfaced
        tx.send(StreamEvent::Message(Message::new(0, Direction::Inbound, "late".into())))
            .unwrap();

        let first = stream.next().await;
        assert!(matches!(first, Some(Err(ClientError::Connection(e))) if e == "boom"));
        assert!(stream.next().await.is_none());
    }
}
