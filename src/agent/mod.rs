//! Connection agents: the per-session protocol handlers a driver runs.
//!
//! A driver calls [`Agent::on_connect`] once, then [`Agent::proceed`] until
//! it returns an error, then [`Agent::close_connect`] once. Any type honoring
//! that contract, real or test double, can be driven.

pub mod relay_agent;

use std::future::Future;
use std::io;

use crate::net::Session;

pub use relay_agent::{AgentState, RelayAgent, QUIT_COMMAND};

/// Why a session stopped.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The cancellation signal was closed. Not a failure.
    #[error("quit")]
    Quit,

    /// The peer closed the stream.
    #[error("client closed")]
    Closed,

    #[error("read error: {0}")]
    Read(#[source] io::Error),

    #[error("write error: {0}")]
    Write(#[source] io::Error),

    #[error("flush error: {0}")]
    Flush(#[source] io::Error),
}

impl AgentError {
    pub fn is_quit(&self) -> bool {
        matches!(self, AgentError::Quit)
    }

    /// The idle deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        match self {
            AgentError::Read(e) | AgentError::Write(e) | AgentError::Flush(e) => {
                e.kind() == io::ErrorKind::TimedOut
            }
            _ => false,
        }
    }

    /// The peer went away, either cleanly or mid-write.
    pub fn is_disconnect(&self) -> bool {
        match self {
            AgentError::Closed => true,
            AgentError::Write(e) | AgentError::Flush(e) => is_peer_gone(e),
            _ => false,
        }
    }
}

pub(crate) fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
    )
}

/// Lifecycle callbacks a driver invokes on each session's handler.
pub trait Agent: Send {
    /// Called once, right after the connection is accepted.
    fn on_connect(&mut self);

    /// One protocol step. `Ok(())` asks the driver to call again;
    /// [`AgentError::Quit`] ends the session normally; anything else ends it
    /// with an error.
    fn proceed(&mut self) -> impl Future<Output = Result<(), AgentError>> + Send;

    /// Called once when the session ends, whatever the reason.
    fn close_connect(&mut self);
}

/// Builds one agent per accepted connection.
pub trait AgentFactory: Send + Sync + 'static {
    type Agent: Agent + 'static;

    fn new_agent(&self, session: Session) -> Self::Agent;
}

impl<F, A> AgentFactory for F
where
    F: Fn(Session) -> A + Send + Sync + 'static,
    A: Agent + 'static,
{
    type Agent = A;

    fn new_agent(&self, session: Session) -> A {
        self(session)
    }
}
