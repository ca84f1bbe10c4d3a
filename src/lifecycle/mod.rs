//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     close command or signal → trigger → handler stops accepting → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every clone of `Shutdown` shares it
//! - In-flight requests finish before the listener closes

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
