/// Error types for the dashfeed client.
/// Covers connection lifecycle, send and teardown failures.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport failed to establish or dropped unexpectedly. Terminal for the handle.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Handle already closed; allocate a new handle to reconnect")]
    HandleClosed,

    /// Releasing the transport failed. The handle is still considered closed.
    #[error("Teardown error: {0}")]
    Teardown(String),

    #[error("Unsupported payload: {0}")]
    UnsupportedPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
