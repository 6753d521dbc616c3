//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, live counts)
//!     → session.rs (buffered halves + QuitSignal)
//!     → driver.rs (agent per session, lifecycle callbacks)
//!
//! Agent states:
//!     Connected → Processing (looped) → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Sessions run sequentially; different sessions run in parallel

pub mod connection;
pub mod driver;
pub mod listener;
pub mod session;

pub use connection::{ConnectionId, ConnectionTracker};
pub use driver::ConnectionDriver;
pub use listener::{Listener, ListenerError};
pub use session::Session;
