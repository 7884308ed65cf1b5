/// HTTP server factory and configuration.
/// Provides a reusable function to create and configure the HTTP server
/// for use in both the main binary and tests.

use crate::handlers::{health, ws_events, ws_raw, WsServer};
use actix_web::{middleware, web, App, HttpServer};

/// Register every route on an app
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        // Raw frames
        .route("/ws", web::get().to(ws_raw))
        // Named events
        .route("/socket", web::get().to(ws_events));
}

/// Create a configured HTTP server
///
/// # Arguments
/// * `ws_server` - WebSocket server instance wrapped in web::Data
/// * `bind_addr` - Address to bind the server to (e.g., "127.0.0.1:8080")
///
/// # Example
/// ```ignore
/// let ws_server = web::Data::new(WsServer::new());
/// let server = server::create_http_server(ws_server, "127.0.0.1:8080")?;
/// server.await?;
/// ```
pub fn create_http_server(
    ws_server: web::Data<WsServer>,
    bind_addr: &str,
) -> std::io::Result<actix_web::dev::Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(ws_server.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}

/// Create a test HTTP server bound to a random available port
///
/// # Returns
/// A tuple of (server, bind_address) where bind_address can be used to connect
///
/// # Example
/// ```ignore
/// let (server, addr) = server::create_test_http_server()?;
/// tokio::spawn(server);
/// let url = format!("ws://{}/ws", addr);
/// ```
pub fn create_test_http_server() -> std::io::Result<(actix_web::dev::Server, String)> {
    create_test_http_server_with_hub(web::Data::new(WsServer::new()))
}

/// Same as [`create_test_http_server`] but with a caller-owned hub, so tests
/// can inspect registered clients.
pub fn create_test_http_server_with_hub(
    ws_server: web::Data<WsServer>,
) -> std::io::Result<(actix_web::dev::Server, String)> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(ws_server.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .workers(1)
    .bind("127.0.0.1:0")?;

    // Get the actual bind address (including the assigned port)
    let addr_str = server
        .addrs()
        .first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "No bind address found"))?
        .to_string();

    Ok((server.run(), addr_str))
}
