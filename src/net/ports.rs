//! Free port allocation.
//!
//! # Responsibilities
//! - Hand out local TCP ports that are free at the time of the call
//! - Abstract the allocator so linting can run with a deterministic one
//!
//! The port is released before it is returned; another process may take it
//! before the handler binds it.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use std::sync::atomic::{AtomicU16, Ordering};

/// Source of free local ports.
pub trait PortAllocator: Send + Sync {
    fn free_port(&self) -> io::Result<u16>;
}

/// Asks the operating system for an ephemeral port on the loopback interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPorts;

impl PortAllocator for LocalPorts {
    fn free_port(&self) -> io::Result<u16> {
        let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
        let port = listener.local_addr()?.port();
        tracing::trace!(port, "Allocated free port");
        Ok(port)
    }
}

/// Counts upward from a fixed port. Never touches the network.
#[derive(Debug)]
pub struct SequentialPorts {
    next: AtomicU16,
}

impl SequentialPorts {
    pub fn starting_at(port: u16) -> Self {
        Self {
            next: AtomicU16::new(port),
        }
    }
}

impl PortAllocator for SequentialPorts {
    fn free_port(&self) -> io::Result<u16> {
        let port = self.next.fetch_add(1, Ordering::Relaxed);
        if port == 0 {
            return Err(io::Error::new(io::ErrorKind::AddrNotAvailable, "port range exhausted"));
        }
        Ok(port)
    }
}
