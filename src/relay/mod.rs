//! Outbound relay subsystem.
//!
//! # Data Flow
//! ```text
//! command line (newline stripped)
//!     → rate_limit.rs (per-session token bucket)
//!     → client.rs (HTTP POST with fixed deadline)
//!     → reply line (backend body or error text, newline-terminated)
//! ```
//!
//! # Design Decisions
//! - One limiter per session, no cross-session fairness
//! - Backend failures never escape as stream errors
//! - No retries

pub mod client;
pub mod rate_limit;

pub use client::{BuildError, RelayClient, RelayClientFactory, RelayError};
pub use rate_limit::TokenBucket;
