/// Configuration management for the dashfeed relay server.
/// Handles command-line argument parsing and config structure.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "Dashfeed Relay Server")]
#[command(about = "Broadcast relay for raw and named-event WebSocket clients", long_about = None)]
pub struct Config {
    /// Server port (default: 8080)
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// PID file path (optional) - write server PID to this file on startup
    #[arg(long)]
    pub pidfile: Option<PathBuf>,
}

impl Config {
    /// Parse command-line arguments into Config
    pub fn from_args() -> Self {
        Config::parse()
    }

    pub fn bind_addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}
