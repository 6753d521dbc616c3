//! Relay agent: reads command lines, relays them, writes the replies.
//!
//! # State Transitions
//! ```text
//! Connected → Processing: first proceed()
//! Processing → Processing: line relayed, or empty line skipped
//! Processing → Closed: "quit\n" received
//! ```
//!
//! The cancellation signal is checked once per step, before the read. A step
//! already blocked in a read or a relay call is not interrupted by it.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{timeout_at, Instant};

use crate::agent::{is_peer_gone, Agent, AgentError};
use crate::net::Session;
use crate::relay::RelayClient;

/// The line that ends a session. Compared byte for byte, newline included.
pub const QUIT_COMMAND: &[u8] = b"quit\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Connected,
    Processing,
    Closed,
}

/// Protocol handler for one session.
pub struct RelayAgent<R = OwnedReadHalf, W = OwnedWriteHalf> {
    session: Session<R, W>,
    client: RelayClient,
    idle_timeout: Duration,
    state: AgentState,
    line: Vec<u8>,
}

impl<R, W> RelayAgent<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(session: Session<R, W>, client: RelayClient, idle_timeout: Duration) -> Self {
        Self {
            session,
            client,
            idle_timeout,
            state: AgentState::Connected,
            line: Vec::new(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn session(&self) -> &Session<R, W> {
        &self.session
    }

    async fn step(&mut self) -> Result<(), AgentError> {
        let deadline = Instant::now() + self.idle_timeout;

        if self.session.quit.is_closed() {
            return Err(AgentError::Quit);
        }
        self.state = AgentState::Processing;

        self.read_line(deadline).await?;

        if self.line == QUIT_COMMAND {
            self.close(deadline).await;
            return Ok(());
        }

        if self.line.len() > 1 {
            let command = String::from_utf8_lossy(&self.line[..self.line.len() - 1]).into_owned();
            let reply = self.client.relay(&command).await;
            self.write_reply(reply.as_bytes(), deadline).await?;
        }
        Ok(())
    }

    async fn read_line(&mut self, deadline: Instant) -> Result<(), AgentError> {
        let peer = self.session.peer_addr;
        self.line.clear();

        match timeout_at(deadline, self.session.reader.read_until(b'\n', &mut self.line)).await {
            Ok(Ok(_)) if self.line.last() == Some(&b'\n') => Ok(()),
            Ok(Ok(_)) => {
                tracing::info!(peer_addr = %peer, "client closed");
                Err(AgentError::Closed)
            }
            Ok(Err(e)) => {
                tracing::error!(peer_addr = %peer, error = %e, "ReadBytes error");
                Err(AgentError::Read(e))
            }
            Err(_) => {
                tracing::error!(
                    peer_addr = %peer,
                    idle_timeout = ?self.idle_timeout,
                    "ReadBytes error: idle timeout"
                );
                Err(AgentError::Read(timed_out()))
            }
        }
    }

    async fn write_reply(&mut self, reply: &[u8], deadline: Instant) -> Result<(), AgentError> {
        let written = timeout_at(deadline, self.session.writer.write_all(reply))
            .await
            .unwrap_or_else(|_| Err(timed_out()));
        if let Err(e) = written {
            self.log_write_failure("Write", &e);
            return Err(AgentError::Write(e));
        }

        let flushed = timeout_at(deadline, self.session.writer.flush())
            .await
            .unwrap_or_else(|_| Err(timed_out()));
        if let Err(e) = flushed {
            self.log_write_failure("Flush", &e);
            return Err(AgentError::Flush(e));
        }
        Ok(())
    }

    fn log_write_failure(&self, op: &str, e: &io::Error) {
        if is_peer_gone(e) {
            tracing::info!(peer_addr = %self.session.peer_addr, "client closed");
        } else {
            tracing::error!(peer_addr = %self.session.peer_addr, error = %e, "{} error", op);
        }
    }

    /// Close the connection and signal cancellation, without a reply.
    async fn close(&mut self, deadline: Instant) {
        if let Ok(Err(e)) = timeout_at(deadline, self.session.writer.shutdown()).await {
            tracing::debug!(peer_addr = %self.session.peer_addr, error = %e, "Shutdown error");
        }
        self.session.quit.close();
        self.state = AgentState::Closed;
    }
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "idle timeout")
}

impl<R, W> Agent for RelayAgent<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn on_connect(&mut self) {
        tracing::info!(
            peer_addr = %self.session.peer_addr,
            connection_id = %self.session.id,
            "client connected"
        );
    }

    async fn proceed(&mut self) -> Result<(), AgentError> {
        self.step().await
    }

    fn close_connect(&mut self) {
        tracing::info!(
            peer_addr = %self.session.peer_addr,
            connection_id = %self.session.id,
            "client connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayTargetConfig;
    use crate::lifecycle::QuitSignal;
    use crate::net::ConnectionId;
    use tokio::io::{AsyncReadExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

    type TestAgent = RelayAgent<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    async fn refused_client(burst_size: u32) -> RelayClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        RelayClient::new(&RelayTargetConfig {
            target_url: format!("http://{}/", addr),
            burst_size,
            requests_per_second: 0.01,
            ..RelayTargetConfig::default()
        })
        .unwrap()
    }

    async fn agent(burst_size: u32, idle: Duration) -> (TestAgent, DuplexStream) {
        let (server, peer) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server);
        let session = Session::new(
            ConnectionId::new(),
            "127.0.0.1:40000".parse().unwrap(),
            reader,
            writer,
            QuitSignal::new(),
        );
        (RelayAgent::new(session, refused_client(burst_size).await, idle), peer)
    }

    async fn read_reply(peer: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        peer.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn replies_in_order() {
        let (mut agent, peer) = agent(1, Duration::from_secs(5)).await;
        let mut peer = BufReader::new(peer);
        peer.get_mut().write_all(b"a\nb\nc\n").await.unwrap();

        for _ in 0..3 {
            agent.proceed().await.unwrap();
        }
        assert_eq!(read_reply(&mut peer).await, "Server unreachable.\n");
        assert_eq!(read_reply(&mut peer).await, "Too Many Requests.\n");
        assert_eq!(read_reply(&mut peer).await, "Too Many Requests.\n");
        assert_eq!(agent.state(), AgentState::Processing);
    }

    #[tokio::test]
    async fn empty_line_is_a_no_op() {
        let (mut agent, peer) = agent(1, Duration::from_secs(5)).await;
        let mut peer = BufReader::new(peer);
        peer.get_mut().write_all(b"\n\nhello\n").await.unwrap();

        agent.proceed().await.unwrap();
        agent.proceed().await.unwrap();
        agent.proceed().await.unwrap();

        // The single token was still there for the real command.
        assert_eq!(read_reply(&mut peer).await, "Server unreachable.\n");
    }

    #[tokio::test]
    async fn quit_closes_without_reply() {
        let (mut agent, mut peer) = agent(5, Duration::from_secs(5)).await;
        peer.write_all(b"quit\n").await.unwrap();

        agent.proceed().await.unwrap();
        assert_eq!(agent.state(), AgentState::Closed);
        assert!(agent.session().quit.is_closed());

        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        assert!(agent.proceed().await.unwrap_err().is_quit());
    }

    #[tokio::test]
    async fn quit_match_is_exact() {
        let (mut agent, peer) = agent(5, Duration::from_secs(5)).await;
        let mut peer = BufReader::new(peer);
        peer.get_mut().write_all(b"Quit\nquit \n").await.unwrap();

        agent.proceed().await.unwrap();
        agent.proceed().await.unwrap();
        assert!(!agent.session().quit.is_closed());
        assert_eq!(read_reply(&mut peer).await, "Server unreachable.\n");
        assert_eq!(read_reply(&mut peer).await, "Server unreachable.\n");
    }

    #[tokio::test]
    async fn cancellation_is_checked_before_reading() {
        let (mut agent, mut peer) = agent(5, Duration::from_secs(5)).await;
        peer.write_all(b"pending\n").await.unwrap();

        agent.session().quit.close();
        assert!(agent.proceed().await.unwrap_err().is_quit());
    }

    #[tokio::test]
    async fn idle_timeout_is_a_read_error() {
        let (mut agent, _peer) = agent(5, Duration::from_millis(50)).await;

        let err = agent.proceed().await.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, AgentError::Read(_)));
    }

    #[tokio::test]
    async fn peer_close_ends_session() {
        let (mut agent, peer) = agent(5, Duration::from_secs(5)).await;
        drop(peer);

        let err = agent.proceed().await.unwrap_err();
        assert!(matches!(err, AgentError::Closed));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn unterminated_fragment_at_eof_is_dropped() {
        let (mut agent, mut peer) = agent(5, Duration::from_secs(5)).await;
        peer.write_all(b"partial").await.unwrap();
        peer.shutdown().await.unwrap();

        assert!(matches!(agent.proceed().await, Err(AgentError::Closed)));
    }
}
