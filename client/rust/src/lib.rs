/// Dashfeed Client Library
/// Real-time connection and message-stream core for managed and raw sockets

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod transport;

pub use error::{ClientError, Result};
pub use models::{ConnectionState, ConnectionStatus, Direction, Endpoint, Message, Payload};
pub use services::{
    ClientHandle, ClientOptions, ConnectionManager, ManagedSocketClient, MessageStore,
    MessageStream, RawSocketClient, SendHandle,
};
pub use transport::{ManagedSocket, RawSocket, ReconnectPolicy, Transport, TransportKind};
