//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! Every problem is collected so a bad file is reported in one pass.

use std::net::SocketAddr;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("relay.requests_per_second: must be a positive number, got {0}")]
    InvalidRate(f64),

    #[error("relay.target_url: {0}")]
    InvalidTarget(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.stats.enabled {
        check_address(&mut errors, "stats.bind_address", &config.stats.bind_address);
    }
    check_address(
        &mut errors,
        "mock_backend.bind_address",
        &config.mock_backend.bind_address,
    );
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_connections" });
    }
    if config.session.idle_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "session.idle_timeout_secs" });
    }
    if config.relay.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "relay.timeout_secs" });
    }
    if config.relay.burst_size == 0 {
        errors.push(ValidationError::Zero { field: "relay.burst_size" });
    }
    let rate = config.relay.requests_per_second;
    if !rate.is_finite() || rate <= 0.0 {
        errors.push(ValidationError::InvalidRate(rate));
    }

    match url::Url::parse(&config.relay.target_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::InvalidTarget(format!(
            "unsupported scheme '{}'",
            url.scheme()
        ))),
        Err(e) => errors.push(ValidationError::InvalidTarget(e.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    // Host names such as "localhost:30000" are resolved at bind time.
    let looks_like_host_port = value
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if value.parse::<SocketAddr>().is_err() && !looks_like_host_port {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn host_names_are_accepted() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "localhost:30000".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "not an address".into();
        config.relay.burst_size = 0;
        config.relay.requests_per_second = -1.0;
        config.relay.target_url = "ftp://example.com".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero { field: "relay.burst_size" }));
        assert!(errors.contains(&ValidationError::InvalidRate(-1.0)));
    }

    #[test]
    fn disabled_stats_address_is_not_checked() {
        let mut config = RelayConfig::default();
        config.stats.enabled = false;
        config.stats.bind_address = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
