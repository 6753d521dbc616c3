//! The streams and signal a driver hands to each new agent.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::lifecycle::QuitSignal;
use crate::net::connection::ConnectionId;

/// One accepted connection: buffered halves plus its cancellation signal.
///
/// Generic over the stream halves so agents can be driven over in-memory
/// pipes as well as TCP.
#[derive(Debug)]
pub struct Session<R = OwnedReadHalf, W = OwnedWriteHalf> {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub reader: BufReader<R>,
    pub writer: BufWriter<W>,
    pub quit: QuitSignal,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(id: ConnectionId, peer_addr: SocketAddr, reader: R, writer: W, quit: QuitSignal) -> Self {
        Self {
            id,
            peer_addr,
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            quit,
        }
    }
}

impl Session {
    /// Split an accepted TCP stream into a session.
    pub fn from_tcp(id: ConnectionId, peer_addr: SocketAddr, stream: TcpStream, quit: QuitSignal) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(id, peer_addr, reader, writer, quit)
    }
}
