//! Rate-limited outbound relay client.
//!
//! # Responsibilities
//! - Throttle commands with a per-session token bucket
//! - POST each admitted command to the backend under a fixed deadline
//! - Turn every outcome into a newline-terminated reply line
//!
//! The transport (`reqwest::Client`) is cheap to clone and shares its
//! connection pool; the limiter is never shared. [`RelayClientFactory`]
//! builds the transport once and hands each session a client with a fresh
//! bucket.

use std::error::Error as StdError;
use std::io;

use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::config::RelayTargetConfig;
use crate::observability::metrics;
use crate::relay::rate_limit::TokenBucket;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Why a relay call produced no backend body.
///
/// The `Display` text of each variant is exactly what the peer sees.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The session's token bucket was empty; the backend was not called.
    #[error("Too Many Requests.")]
    RateLimited,

    /// The backend refused the connection.
    #[error("Server unreachable.")]
    Unreachable,

    /// Any other transport failure, including a body that could not be read.
    #[error("{0}")]
    Transport(String),
}

impl RelayError {
    fn outcome(&self) -> &'static str {
        match self {
            RelayError::RateLimited => "rate_limited",
            RelayError::Unreachable => "unreachable",
            RelayError::Transport(_) => "transport_error",
        }
    }
}

/// Error building the shared HTTP transport.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid relay target '{url}': {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Builds one [`RelayClient`] per session over a shared transport.
#[derive(Debug, Clone)]
pub struct RelayClientFactory {
    http: reqwest::Client,
    target: Url,
    burst_size: u32,
    requests_per_second: f64,
}

impl RelayClientFactory {
    pub fn new(config: &RelayTargetConfig) -> Result<Self, BuildError> {
        let target = Url::parse(&config.target_url).map_err(|source| BuildError::InvalidTarget {
            url: config.target_url.clone(),
            source,
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .no_proxy()
            .build()?;

        Ok(Self {
            http,
            target,
            burst_size: config.burst_size,
            requests_per_second: config.requests_per_second,
        })
    }

    /// A client with a full, private token bucket.
    pub fn build(&self) -> RelayClient {
        RelayClient {
            http: self.http.clone(),
            target: self.target.clone(),
            limiter: TokenBucket::new(self.burst_size, self.requests_per_second),
        }
    }
}

/// Relays text commands to the backend for a single session.
#[derive(Debug)]
pub struct RelayClient {
    http: reqwest::Client,
    target: Url,
    limiter: TokenBucket,
}

impl RelayClient {
    /// Standalone client with its own transport.
    pub fn new(config: &RelayTargetConfig) -> Result<Self, BuildError> {
        Ok(RelayClientFactory::new(config)?.build())
    }

    /// Relay `command` and return the reply line. Never fails: every error
    /// is rendered as text, and the result always ends with `\n`.
    pub async fn relay(&mut self, command: &str) -> String {
        let mut reply = match self.try_relay(command).await {
            Ok(body) => {
                metrics::record_relay("ok");
                body
            }
            Err(e) => {
                metrics::record_relay(e.outcome());
                e.to_string()
            }
        };
        reply.push('\n');
        reply
    }

    /// Relay `command`, keeping the failure class.
    pub async fn try_relay(&mut self, command: &str) -> Result<String, RelayError> {
        if !self.limiter.try_acquire() {
            tracing::debug!(target_url = %self.target, "Relay rate limited");
            return Err(RelayError::RateLimited);
        }

        let response = self
            .http
            .post(self.target.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(command.to_owned())
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| classify(&e))?;

        tracing::debug!(
            target_url = %self.target,
            status = %status,
            bytes = body.len(),
            "Relay call completed"
        );
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Map a transport error to its reply class, logging it once.
fn classify(err: &reqwest::Error) -> RelayError {
    let text = error_chain(err);
    tracing::warn!(error = %text, timeout = err.is_timeout(), "Relay API error");

    if is_connection_refused(err) {
        RelayError::Unreachable
    } else {
        RelayError::Transport(text)
    }
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        if e.to_string().to_ascii_lowercase().contains("connection refused") {
            return true;
        }
        source = e.source();
    }
    false
}

/// `reqwest` keeps the interesting part of an error in its sources.
fn error_chain(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        let part = e.to_string();
        if !text.contains(&part) {
            text.push_str(": ");
            text.push_str(&part);
        }
        source = e.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(target: String) -> RelayTargetConfig {
        RelayTargetConfig {
            target_url: target,
            ..RelayTargetConfig::default()
        }
    }

    async fn refused_address() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }

    /// Backend that promises a 100 byte body, sends a few bytes and hangs up.
    async fn truncating_backend() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"hello") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn rejects_invalid_target() {
        let err = RelayClient::new(&config_for("not a url".into())).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTarget { .. }));
    }

    #[test]
    fn reply_text_matches_wire_messages() {
        assert_eq!(RelayError::RateLimited.to_string(), "Too Many Requests.");
        assert_eq!(RelayError::Unreachable.to_string(), "Server unreachable.");
        assert_eq!(RelayError::Transport("boom".into()).to_string(), "boom");
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let mut client = RelayClient::new(&config_for(refused_address().await)).unwrap();
        assert_eq!(client.relay("hello").await, "Server unreachable.\n");
    }

    #[tokio::test]
    async fn excess_calls_are_rate_limited() {
        let mut config = config_for(refused_address().await);
        config.requests_per_second = 0.01;
        let mut client = RelayClient::new(&config).unwrap();

        for _ in 0..5 {
            assert_eq!(client.relay("hello").await, "Server unreachable.\n");
        }
        assert!(matches!(
            client.try_relay("hello").await,
            Err(RelayError::RateLimited)
        ));
        assert_eq!(client.relay("hello").await, "Too Many Requests.\n");
    }

    #[tokio::test]
    async fn factory_gives_each_client_its_own_bucket() {
        let mut config = config_for(refused_address().await);
        config.burst_size = 1;
        config.requests_per_second = 0.01;
        let factory = RelayClientFactory::new(&config).unwrap();

        let mut first = factory.build();
        let mut second = factory.build();
        assert_eq!(first.relay("a").await, "Server unreachable.\n");
        assert_eq!(first.relay("a").await, "Too Many Requests.\n");
        assert_eq!(second.relay("b").await, "Server unreachable.\n");
    }

    #[tokio::test]
    async fn truncated_body_is_a_transport_error() {
        let mut client = RelayClient::new(&config_for(truncating_backend().await)).unwrap();

        assert!(matches!(
            client.try_relay("hello").await,
            Err(RelayError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn truncated_body_reply_is_error_text() {
        let mut client = RelayClient::new(&config_for(truncating_backend().await)).unwrap();

        let reply = client.relay("hello").await;
        assert!(reply.ends_with('\n'));
        assert_ne!(reply, "Server unreachable.\n");
        assert_ne!(reply, "partial\n");
        assert!(reply.len() > 1, "empty error text");
    }
}
