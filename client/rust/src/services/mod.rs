/// Service layer for the dashfeed client.
/// Connection lifecycle, message store and the transport-agnostic contract.

pub mod client_handle;
pub mod connection_manager;
pub mod message_store;
pub(crate) mod session;

pub use client_handle::{ClientHandle, ClientOptions, ManagedSocketClient, RawSocketClient, SendHandle};
pub use connection_manager::{ConnectionManager, MessageStream};
pub use message_store::MessageStore;
