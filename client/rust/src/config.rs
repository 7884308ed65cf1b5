/// Configuration for the dashfeed binary.
/// Parses command-line arguments and turns them into client settings.

use crate::error::Result;
use crate::models::{Endpoint, Payload};
use crate::services::{ClientHandle, ClientOptions, ConnectionManager};
use crate::transport::{ManagedSocket, RawSocket, ReconnectPolicy};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportChoice {
    /// Named events with automatic reconnection
    Managed,
    /// Bare socket, one frame per message
    Raw,
}

#[derive(Parser, Debug)]
#[command(name = "dashfeed")]
#[command(about = "Stream real-time messages from a socket endpoint", long_about = None)]
pub struct Config {
    /// Endpoint to connect to (ws://, wss://, http:// or https://)
    #[arg(long)]
    pub endpoint: String,

    /// Transport variant
    #[arg(long, value_enum, default_value = "managed")]
    pub transport: TransportChoice,

    /// Event name for the managed transport (default: message)
    #[arg(long, default_value = "message")]
    pub event: String,

    /// Record outbound messages in the history as well
    #[arg(long)]
    pub log_outbound: bool,

    /// Keep at most this many messages in the history
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Text sent every time the connection opens
    #[arg(long)]
    pub greeting: Option<String>,

    /// Re-dial attempts for the managed transport (0 disables reconnection)
    #[arg(long, default_value = "12")]
    pub max_reconnect_attempts: u32,

    /// Enable verbose logging (DEBUG level)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse command-line arguments into Config
    pub fn from_args() -> Self {
        Config::parse()
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.endpoint)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            log_outbound: self.log_outbound,
            store_capacity: self.capacity,
            greeting: self.greeting.clone().map(Payload::Text),
            ..ClientOptions::default()
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            ..ReconnectPolicy::default()
        }
    }

    /// Build an idle client for the selected transport
    pub fn build_client(&self) -> Box<dyn ConnectionManager> {
        let options = self.client_options();
        match self.transport {
            TransportChoice::Managed => {
                let transport = ManagedSocket::new()
                    .with_event(self.event.clone())
                    .with_reconnect(self.reconnect_policy());
                Box::new(ClientHandle::new(transport, options))
            }
            TransportChoice::Raw => Box::new(ClientHandle::new(RawSocket::new(), options)),
        }
    }
}
