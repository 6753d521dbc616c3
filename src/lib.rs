//! Line relay library.
//!
//! Terminates newline-delimited TCP sessions and relays every command line
//! to an HTTP backend under a per-session rate limit.

pub mod agent;
pub mod cli;
pub mod client;
pub mod config;
pub mod lifecycle;
pub mod mock_backend;
pub mod net;
pub mod observability;
pub mod relay;
pub mod server;
pub mod stats;

pub use agent::{Agent, AgentError, AgentFactory, RelayAgent};
pub use config::RelayConfig;
pub use lifecycle::{QuitSignal, Shutdown};
pub use net::ConnectionDriver;
pub use relay::{RelayClient, RelayClientFactory};
