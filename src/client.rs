//! Line-oriented TCP client, used by the interactive `client` mode and by
//! tests that talk to a running relay.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// A connected line client.
pub struct TcpClient {
    address: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpClient {
    pub async fn connect(address: &str) -> io::Result<Self> {
        let (reader, writer) = TcpStream::connect(address).await?.into_split();
        Ok(Self {
            address: address.to_string(),
            reader: BufReader::new(reader),
            writer,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one line, appending `\n` if it is missing.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await
    }

    /// Read one reply line, newline included. `None` once the server closed.
    pub async fn read_reply(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Send `line` and wait for its reply.
    pub async fn request(&mut self, line: &str) -> io::Result<Option<String>> {
        self.send_line(line).await?;
        self.read_reply().await
    }
}

/// Interactive loop: prompt on stdout, read from `input`, print replies.
pub async fn run_interactive<I>(client: &mut TcpClient, input: I) -> io::Result<()>
where
    I: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"Text to send: ").await?;
        stdout.flush().await?;

        let Some(text) = lines.next_line().await? else {
            return Ok(());
        };
        client.send_line(&text).await?;
        if text == "quit" {
            tracing::info!(server = %client.address(), "Quit sent");
            return Ok(());
        }
        if text.is_empty() {
            continue;
        }

        match client.read_reply().await? {
            Some(reply) => {
                stdout.write_all(format!("Message from server: {}", reply).as_bytes()).await?;
            }
            None => {
                tracing::info!(server = %client.address(), "Server closed the connection");
                return Ok(());
            }
        }
    }
}
