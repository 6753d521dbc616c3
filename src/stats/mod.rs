//! Runtime stats endpoint.
//!
//! `GET /` returns a plain-text snapshot, `GET /stats.json` the same
//! snapshot as JSON. The connection counts are read from the driver's
//! tracker; nothing here writes them.

pub mod handlers;

use std::net::SocketAddr;
use std::time::Instant;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::net::ConnectionTracker;
use self::handlers::{get_stats_json, get_stats_text};

/// State shared by the stats handlers.
#[derive(Clone)]
pub struct StatsState {
    pub connections: ConnectionTracker,
    pub started: Instant,
}

impl StatsState {
    pub fn new(connections: ConnectionTracker) -> Self {
        Self {
            connections,
            started: Instant::now(),
        }
    }
}

pub fn setup_stats_router(state: StatsState) -> Router {
    Router::new()
        .route("/", get(get_stats_text))
        .route("/stats.json", get(get_stats_json))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the stats endpoint until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: StatsState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!(address = %addr, "Stats endpoint listening");

    axum::serve(listener, setup_stats_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
