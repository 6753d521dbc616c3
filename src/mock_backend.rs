//! Mock backend for local testing: echoes whatever the relay POSTs.

use axum::{body::Bytes, routing::any, Router};
use axum::http::Method;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

/// `date`-style timestamp, e.g. `Mon Jan  2 15:04:05 UTC 2006`.
const UNIX_DATE: &str = "%a %b %e %H:%M:%S UTC %Y";

pub fn setup_mock_router() -> Router {
    Router::new()
        .route("/{*path}", any(mock_handler))
        .route("/", any(mock_handler))
        .layer(TraceLayer::new_for_http())
}

async fn mock_handler(method: Method, body: Bytes) -> String {
    if method == Method::POST {
        let body = String::from_utf8_lossy(&body);
        tracing::info!(message = %body, "Got message");
        format!("you send: {}", body)
    } else {
        chrono::Utc::now().format(UNIX_DATE).to_string()
    }
}

/// Serve the mock backend until `shutdown` fires.
pub async fn serve(listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
    tracing::info!(address = %listener.local_addr()?, "API mock server listening");
    axum::serve(listener, setup_mock_router())
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn post_echoes_body() {
        let reply = mock_handler(Method::POST, Bytes::from_static(b"hello")).await;
        assert_eq!(reply, "you send: hello");
    }

    #[tokio::test]
    async fn get_returns_utc_date() {
        let reply = mock_handler(Method::GET, Bytes::new()).await;
        assert!(reply.contains(" UTC "));
        let year = chrono::Utc::now().format("%Y").to_string();
        assert!(reply.ends_with(&year));
    }
}
