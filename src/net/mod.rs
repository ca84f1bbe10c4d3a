//! Network helpers.
//!
//! # Data Flow
//! ```text
//! generate-handler / lint rewrite
//!     → PortAllocator::free_port()
//!     → LocalPorts (bind 127.0.0.1:0, read the port, release)
//!     → port written into the handler descriptor
//! ```
//!
//! # Design Decisions
//! - Allocation goes through a trait object so tests use `SequentialPorts`
//! - No port is reserved; the descriptor only records it

pub mod ports;

pub use ports::{LocalPorts, PortAllocator, SequentialPorts};
