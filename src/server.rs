//! Relay server: the connection driver running relay agents, plus the
//! stats endpoint.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::agent::{AgentFactory, RelayAgent};
use crate::config::RelayConfig;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionDriver, ConnectionTracker, ListenerError, Session};
use crate::relay::{BuildError, RelayClientFactory};
use crate::stats::{self, StatsState};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Relay(#[from] BuildError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to bind stats endpoint {address}: {source}")]
    Stats {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Builds a [`RelayAgent`] with a fresh relay client for every session.
pub struct RelayAgentFactory {
    clients: RelayClientFactory,
    idle_timeout: Duration,
}

impl RelayAgentFactory {
    pub fn new(clients: RelayClientFactory, idle_timeout: Duration) -> Self {
        Self { clients, idle_timeout }
    }
}

impl AgentFactory for RelayAgentFactory {
    type Agent = RelayAgent;

    fn new_agent(&self, session: Session) -> RelayAgent {
        RelayAgent::new(session, self.clients.build(), self.idle_timeout)
    }
}

pub struct RelayServer {
    config: RelayConfig,
    driver: ConnectionDriver<RelayAgentFactory>,
    shutdown: Shutdown,
    stats_addr: Option<SocketAddr>,
    stats_task: Option<JoinHandle<std::io::Result<()>>>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let clients = RelayClientFactory::new(&config.relay)?;
        let factory = RelayAgentFactory::new(clients, config.session.idle_timeout());
        let driver = ConnectionDriver::new(
            config.listener.clone(),
            config.session.drain_timeout(),
            factory,
        );

        Ok(Self {
            config,
            driver,
            shutdown: Shutdown::new(),
            stats_addr: None,
            stats_task: None,
        })
    }

    /// Start the driver and, if enabled, the stats endpoint.
    /// Returns the relay's bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        let addr = self.driver.start().await?;
        tracing::info!(
            address = %addr,
            target_url = %self.config.relay.target_url,
            "Relay server started"
        );

        if self.config.stats.enabled {
            let address = self.config.stats.bind_address.clone();
            let listener = TcpListener::bind(address.as_str())
                .await
                .map_err(|source| ServerError::Stats { address: address.clone(), source })?;
            self.stats_addr = listener.local_addr().ok();

            let state = StatsState::new(self.driver.connections());
            let shutdown = self.shutdown.subscribe();
            self.stats_task = Some(tokio::spawn(stats::serve(listener, state, shutdown)));
        }
        Ok(addr)
    }

    pub fn stats_addr(&self) -> Option<SocketAddr> {
        self.stats_addr
    }

    pub fn connections(&self) -> ConnectionTracker {
        self.driver.connections()
    }

    pub fn stop(&self) {
        self.driver.stop();
        self.shutdown.trigger();
    }

    /// Wait for the driver to drain and the stats endpoint to exit.
    pub async fn wait(&mut self) {
        self.driver.wait().await;
        if let Some(task) = self.stats_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Stats endpoint failed"),
                Err(e) => tracing::error!(error = %e, "Stats endpoint panicked"),
            }
        }
        tracing::info!("Relay server stopped");
    }
}
