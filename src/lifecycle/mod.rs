//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl-C → driver stop → every session's QuitSignal closed → drain
//!
//! Per session (cancel.rs):
//!     QuitSignal closed by the quit command or by the driver, exactly once
//!
//! Signals (signals.rs):
//!     SIGINT → trigger graceful shutdown
//! ```

pub mod cancel;
pub mod shutdown;
pub mod signals;

pub use cancel::QuitSignal;
pub use shutdown::Shutdown;
