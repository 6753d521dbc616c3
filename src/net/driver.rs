//! Connection driver: accepts connections and runs one agent per session.
//!
//! # Responsibilities
//! - Accept connections under the `max_connections` limit
//! - Build an agent per connection and drive its lifecycle callbacks
//! - Keep the live connection counts
//! - On stop: stop accepting, close every session's `QuitSignal`, drain
//!
//! Sessions blocked in a read only notice a stop when their read finishes or
//! times out, so draining is bounded by `drain_timeout`; sessions still
//! running after it are aborted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};

use crate::agent::{Agent, AgentFactory};
use crate::config::ListenerConfig;
use crate::lifecycle::{QuitSignal, Shutdown};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::session::Session;

/// Drives agents built by `F` over accepted TCP connections.
pub struct ConnectionDriver<F> {
    config: ListenerConfig,
    drain_timeout: Duration,
    factory: Arc<F>,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    accept_task: Option<JoinHandle<()>>,
}

impl<F: AgentFactory> ConnectionDriver<F> {
    pub fn new(config: ListenerConfig, drain_timeout: Duration, factory: F) -> Self {
        Self {
            config,
            drain_timeout,
            factory: Arc::new(factory),
            tracker: ConnectionTracker::new(),
            shutdown: Shutdown::new(),
            accept_task: None,
        }
    }

    /// Bind and start accepting in the background. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, ListenerError> {
        let listener = Listener::bind(&self.config).await?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: self.config.bind_address.clone(),
            source,
        })?;

        // Subscribe before spawning so a stop() issued before the task first
        // runs is not lost.
        let shutdown_rx = self.shutdown.subscribe();
        let accept_loop = AcceptLoop {
            listener,
            shutdown_rx,
            factory: Arc::clone(&self.factory),
            tracker: self.tracker.clone(),
            shutdown: self.shutdown.clone(),
            drain_timeout: self.drain_timeout,
        };
        self.accept_task = Some(tokio::spawn(accept_loop.run()));

        tracing::info!(address = %local_addr, "Connection driver started");
        Ok(local_addr)
    }

    /// Stop accepting and signal every session to quit.
    pub fn stop(&self) {
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Stopping connection driver"
        );
        self.shutdown.trigger();
    }

    /// Block until the accept loop has exited and all sessions have drained.
    pub async fn wait(&mut self) {
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Accept loop panicked");
            }
        }
    }

    /// Live handle to the connection counts.
    pub fn connections(&self) -> ConnectionTracker {
        self.tracker.clone()
    }
}

/// Pause after a failed accept (e.g. descriptor exhaustion) before retrying.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

struct AcceptLoop<F> {
    listener: Listener,
    shutdown_rx: broadcast::Receiver<()>,
    factory: Arc<F>,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    drain_timeout: Duration,
}

enum Event {
    Stop,
    Accepted(Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError>),
    Reaped,
}

impl<F: AgentFactory> AcceptLoop<F> {
    async fn run(mut self) {
        let mut sessions = JoinSet::new();

        loop {
            let event = tokio::select! {
                _ = self.shutdown_rx.recv() => Event::Stop,
                accepted = self.listener.accept() => Event::Accepted(accepted),
                Some(_) = sessions.join_next(), if !sessions.is_empty() => Event::Reaped,
            };

            match event {
                Event::Stop | Event::Accepted(Err(ListenerError::Closed)) => break,
                Event::Accepted(Ok((stream, peer_addr, permit))) => {
                    let guard = self.tracker.track();
                    let quit = QuitSignal::new();
                    let session = Session::from_tcp(guard.id(), peer_addr, stream, quit.clone());
                    let agent = self.factory.new_agent(session);
                    sessions.spawn(run_session(agent, quit, self.shutdown.subscribe(), guard, permit));
                }
                Event::Accepted(Err(e)) => {
                    tracing::warn!(
                        error = %e,
                        available_permits = self.listener.available_permits(),
                        "Accept failed"
                    );
                    accept_backoff().await;
                }
                Event::Reaped => {}
            }
        }

        tracing::info!(
            sessions = sessions.len(),
            max_connections = self.listener.max_connections(),
            "Listener closed, draining sessions"
        );
        drop(self.listener);

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                sessions = sessions.len(),
                drain_timeout = ?self.drain_timeout,
                "Aborting sessions still running after drain timeout"
            );
            sessions.shutdown().await;
        }
        tracing::info!("Connection driver stopped");
    }
}

async fn accept_backoff() {
    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
}

async fn run_session<A: Agent>(
    mut agent: A,
    quit: QuitSignal,
    mut shutdown_rx: broadcast::Receiver<()>,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    // Driver-initiated stop closes the session's signal; the agent sees it
    // at the top of its next step.
    let stop_watch = {
        let quit = quit.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    quit.close();
                }
                _ = quit.closed() => {}
            }
        })
    };

    agent.on_connect();
    loop {
        match agent.proceed().await {
            Ok(()) => {}
            Err(e) if e.is_quit() => {
                tracing::debug!(connection_id = %guard.id(), "Session quit");
                break;
            }
            Err(e) => {
                tracing::debug!(connection_id = %guard.id(), error = %e, "Session ended");
                break;
            }
        }
    }
    agent.close_connect();
    stop_watch.abort();
}
