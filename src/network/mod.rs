//! Network module - Handles UDP communication with the device
//!
//! Provides:
//! - The `Port` trait, the endpoint interface the device handle drives
//! - `UdpPort`, a tokio UDP implementation of it

mod udp;

pub use udp::*;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// A datagram endpoint: send, bounded wait, then receive
#[async_trait]
pub trait Port: Send {
    /// Send one datagram
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Wait up to `timeout` for a datagram. Returns false on timeout.
    async fn wait_for_data(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Receive one datagram into `buf`, returning the datagram's full
    /// length. A datagram longer than `buf` is truncated but its true
    /// length is still reported.
    async fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let mut addrs = lookup_host((host, port)).await?;

    addrs.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
