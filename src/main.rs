//! line-relay: newline-delimited TCP to HTTP relay.
//!
//! ```text
//!   TCP peer ──line──▶ RelayAgent ──POST──▶ backend
//!            ◀─reply──            ◀─body───
//! ```
//!
//! Modes (`--demo-type`):
//! - `server`: relay server plus stats endpoint
//! - `client`: interactive TCP client
//! - `apiserver`: mock backend echoing `you send: <body>`

use clap::Parser;
use tokio::net::TcpListener;

use line_relay::cli::{CliArgs, DemoType};
use line_relay::client::{run_interactive, TcpClient};
use line_relay::config::{loader, RelayConfig};
use line_relay::lifecycle::{signals, Shutdown};
use line_relay::mock_backend;
use line_relay::observability::{logging, metrics};
use line_relay::server::RelayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();
    let config = loader::resolve(&cli)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), mode = ?cli.demo_type, "line-relay starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.demo_type {
        DemoType::Server => run_server(config).await,
        DemoType::Client => run_client(&config).await,
        DemoType::Apiserver => run_mock_backend(&config).await,
    }
}

async fn run_server(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut server = RelayServer::new(config)?;
    server.start().await?;
    tracing::info!(total_connections = server.connections().accepted_count(), "Server ready");
    if let Some(addr) = server.stats_addr() {
        tracing::info!(address = %addr, "Stats available");
    }

    tracing::info!("CTRL-C to exit");
    signals::ctrl_c().await?;

    server.stop();
    server.wait().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn run_client(config: &RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = TcpClient::connect(&config.listener.bind_address).await?;
    tracing::info!(server = %client.address(), "Connected");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_interactive(&mut client, stdin).await?;
    Ok(())
}

async fn run_mock_backend(config: &RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(config.mock_backend.bind_address.as_str()).await?;
    let shutdown = Shutdown::new();
    let server = tokio::spawn(mock_backend::serve(listener, shutdown.subscribe()));

    signals::ctrl_c().await?;
    shutdown.trigger();
    server.await??;
    Ok(())
}
