//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Bytes, Router};
use line_relay::config::RelayConfig;
use line_relay::mock_backend;
use line_relay::server::RelayServer;
use tokio::net::TcpListener;

/// Start the echoing mock backend on an ephemeral port.
pub async fn start_mock_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, mock_backend::setup_mock_router()).await;
    });
    addr
}

/// Start a backend whose reply to each POST body is computed by `f`.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = String> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);
    let app = Router::new().fallback(move |body: Bytes| {
        let f = Arc::clone(&f);
        async move { f(String::from_utf8_lossy(&body).into_owned()).await }
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn refused_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Relay config on ephemeral ports pointing at `backend`.
pub fn relay_config(backend: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.stats.bind_address = "127.0.0.1:0".into();
    config.relay.target_url = format!("http://{}/", backend);
    config.session.drain_timeout_secs = 1;
    config
}

/// Start a relay server; returns it with its TCP address.
pub async fn start_relay(config: RelayConfig) -> (RelayServer, SocketAddr) {
    let mut server = RelayServer::new(config).unwrap();
    let addr = server.start().await.unwrap();
    (server, addr)
}
