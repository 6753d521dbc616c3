//! Command-line arguments.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which part of the demo this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoType {
    /// Line relay server plus the stats endpoint.
    Server,
    /// Interactive TCP client reading commands from stdin.
    Client,
    /// Mock backend that echoes relayed commands.
    Apiserver,
}

#[derive(Parser, Debug)]
#[command(name = "line-relay")]
#[command(version)]
#[command(about = "Relays newline-delimited TCP commands to an HTTP backend", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TCP server address (overrides listener.bind_address)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Demo type: server, client or apiserver
    #[arg(short, long, value_enum, default_value_t = DemoType::Server)]
    pub demo_type: DemoType,

    /// Backend URL commands are relayed to (overrides relay.target_url)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_server_mode() {
        let args = CliArgs::parse_from(["line-relay"]);
        assert_eq!(args.demo_type, DemoType::Server);
        assert!(args.server.is_none());
    }

    #[test]
    fn parses_client_mode() {
        let args = CliArgs::parse_from([
            "line-relay",
            "--demo-type",
            "client",
            "--server",
            "localhost:30000",
        ]);
        assert_eq!(args.demo_type, DemoType::Client);
        assert_eq!(args.server.as_deref(), Some("localhost:30000"));
    }
}
