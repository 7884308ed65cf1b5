/// Dashfeed - Main entry point
///
/// Connects to a socket endpoint and streams messages to the terminal
use dashfeed_client::{cli, config::Config, Result};
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args();

    // Initialize logger with appropriate level based on verbose flag
    let log_level = if config.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let endpoint = config.endpoint()?;

    info!("Starting dashfeed");
    info!("Endpoint: {}", endpoint);
    info!("Transport: {:?}", config.transport);

    let client = config.build_client();
    client.open(&endpoint)?;

    let result = cli::run_client_loop(client.as_ref()).await;

    // Give the teardown a moment to finish before the runtime exits
    client.close();
    let mut status = client.watch_status();
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        status.wait_for(|s| s.state.is_terminal()),
    )
    .await;
    info!("Final state: {}", client.status());

    result
}
