//! UDP endpoints
//!
//! A device handle uses two of these: a server bound to the fixed local
//! port that receives replies, and a sender connected to the device.

use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

use super::{resolve_host, Port};

/// Receive buffer size; larger than any valid message so oversized
/// datagrams show up as framing errors rather than being truncated
const RECV_BUFFER_SIZE: usize = 64;

/// A tokio UDP socket implementing `Port`
pub struct UdpPort {
    socket: UdpSocket,
    /// Datagram picked up by `wait_for_data`, handed out by `receive`
    pending: Option<Vec<u8>>,
}

impl UdpPort {
    /// Bind a receiving endpoint to `port`, on `bind_address` if given
    pub async fn server(port: u16, bind_address: Option<&str>) -> io::Result<Self> {
        let host = bind_address
            .filter(|a| !a.is_empty())
            .unwrap_or("0.0.0.0");
        let addr = resolve_host(host, port).await?;
        let socket = UdpSocket::bind(addr).await?;

        tracing::debug!("UDP server bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            pending: None,
        })
    }

    /// Create a sending endpoint targeting `host:port`
    pub async fn sender(host: &str, port: u16) -> io::Result<Self> {
        let remote = resolve_host(host, port).await?;
        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;

        tracing::debug!("UDP sender {} -> {}", socket.local_addr()?, remote);

        Ok(Self {
            socket,
            pending: None,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    async fn recv_datagram(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        tracing::trace!("Received {} bytes from {}", len, from);
        Ok(buf)
    }
}

#[async_trait]
impl Port for UdpPort {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(bytes).await?;
        if sent != bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("Short send: {} of {} bytes", sent, bytes.len()),
            ));
        }
        Ok(())
    }

    async fn wait_for_data(&mut self, timeout: Duration) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }

        match tokio::time::timeout(timeout, self.recv_datagram()).await {
            Ok(Ok(datagram)) => {
                self.pending = Some(datagram);
                Ok(true)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(false),
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let datagram = match self.pending.take() {
            Some(d) => d,
            None => self.recv_datagram().await?,
        };

        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(datagram.len())
    }
}

impl std::fmt::Debug for UdpPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpPort")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("peer_addr", &self.socket.peer_addr().ok())
            .finish()
    }
}
