/// Dashfeed Relay Server
///
/// Main server entry point. Handles:
/// - Command-line argument parsing
/// - HTTP and WebSocket server startup
use actix_web::web;
use dashfeed_server::config::Config;
use dashfeed_server::handlers::WsServer;
use dashfeed_server::server;
use std::fs;
use std::process;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let config = Config::from_args();

    log::info!("Starting dashfeed relay server");
    log::info!("Port: {}", config.port);

    // Write PID file if specified
    if let Some(pidfile) = &config.pidfile {
        let pid = process::id().to_string();
        fs::write(pidfile, pid)?;
        log::info!("PID file written to: {:?}", pidfile);
    }

    let ws_server = web::Data::new(WsServer::new());

    let bind_addr = config.bind_addr();
    log::info!("Starting HTTP server on {}", bind_addr);

    let http_server = server::create_http_server(ws_server, &bind_addr)?;
    http_server.await
}
