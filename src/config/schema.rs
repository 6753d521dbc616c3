//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Per-connection session settings.
    pub session: SessionConfig,

    /// Outbound relay target and throttling.
    pub relay: RelayTargetConfig,

    /// Runtime stats endpoint.
    pub stats: StatsConfig,

    /// Mock backend used by the `apiserver` demo mode.
    pub mock_backend: MockBackendConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:30000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:30000".to_string(),
            max_connections: 100,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a session may wait for its next line, in seconds.
    pub idle_timeout_secs: u64,

    /// How long `wait` lets sessions drain after a stop before aborting them.
    pub drain_timeout_secs: u64,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 20,
            drain_timeout_secs: 5,
        }
    }
}

/// Relay target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayTargetConfig {
    /// Backend URL every command is POSTed to.
    pub target_url: String,

    /// Total time allowed for one backend call, in seconds.
    pub timeout_secs: u64,

    /// Token refill rate of each session's limiter.
    pub requests_per_second: f64,

    /// Burst capacity of each session's limiter.
    pub burst_size: u32,
}

impl RelayTargetConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RelayTargetConfig {
    fn default() -> Self {
        Self {
            target_url: "http://127.0.0.1:30002/".to_string(),
            timeout_secs: 5,
            requests_per_second: 2.0,
            burst_size: 5,
        }
    }
}

/// Stats endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Serve the stats endpoint next to the relay server.
    pub enabled: bool,

    /// Stats endpoint bind address.
    pub bind_address: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:30001".to_string(),
        }
    }
}

/// Mock backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MockBackendConfig {
    pub bind_address: String,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:30002".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
