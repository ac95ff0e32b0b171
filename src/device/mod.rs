//! Device handle
//!
//! Owns the two endpoints used to talk to a remote register device and
//! runs the send, wait, validate, classify cycle behind every read and write.
//!
//! The protocol has no transaction identifier: a reply is matched to its
//! request only by opcode and address. Only one transaction may be
//! outstanding per device, which is why every operation takes `&mut self`.

use crate::error::{EthRegError, EthRegResult};
use crate::network::{Port, UdpPort};
use crate::protocol::{
    decode, encode, Address, CodecError, RegisterMessage, LOCAL_PORT, MESSAGE_SIZE, REMOTE_PORT,
    RESPONSE_TIMEOUT,
};

/// A connected register device
pub struct Device<P: Port = UdpPort> {
    /// Receives replies on the fixed local port
    server: P,
    /// Sends requests to the device
    sender: P,
}

impl Device<UdpPort> {
    /// Open both UDP endpoints and probe the device at `remote_host`
    pub async fn connect(remote_host: &str, bind_to: Option<&str>) -> EthRegResult<Self> {
        let server = UdpPort::server(LOCAL_PORT, bind_to).await.map_err(|e| {
            tracing::warn!("Cannot bind UDP port {}: {}", LOCAL_PORT, e);
            EthRegError::ServerCreateFailed(e)
        })?;

        let sender = UdpPort::sender(remote_host, REMOTE_PORT).await.map_err(|e| {
            tracing::warn!("Cannot reach {}:{}: {}", remote_host, REMOTE_PORT, e);
            EthRegError::ClientCreateFailed(e)
        })?;

        tracing::info!("Connecting to {}:{}", remote_host, REMOTE_PORT);
        Self::bootstrap(server, sender).await
    }
}

impl<P: Port> Device<P> {
    /// Probe the device with a READ32 of address 0 over already-open
    /// endpoints. Any reply at all counts as "device present".
    pub async fn bootstrap(mut server: P, mut sender: P) -> EthRegResult<Self> {
        let probe = RegisterMessage::read32(0);

        sender
            .send(&encode(&probe))
            .await
            .map_err(EthRegError::Transport)?;

        let ready = server
            .wait_for_data(RESPONSE_TIMEOUT)
            .await
            .map_err(EthRegError::Transport)?;
        if !ready {
            tracing::warn!("No response to connection probe");
            return Err(EthRegError::NoConnectResponse);
        }

        let mut buf = [0u8; MESSAGE_SIZE];
        server
            .receive(&mut buf)
            .await
            .map_err(EthRegError::Transport)?;

        tracing::info!("Device responded to connection probe");

        Ok(Self { server, sender })
    }

    /// Send one request and return the validated reply.
    ///
    /// Fails with `NoResponse` if nothing arrives in time, `MalformedResponse`
    /// if the reply does not echo the request, and `RemoteError` if the
    /// device reports a nonzero status. There are no retries.
    pub async fn transact(&mut self, mut request: RegisterMessage) -> EthRegResult<RegisterMessage> {
        request.respond_to = LOCAL_PORT;

        let opcode = request.opcode;
        let address = Address(request.address);

        tracing::debug!("-> {} {} data={:#x}", opcode, address, request.data);

        self.sender
            .send(&encode(&request))
            .await
            .map_err(EthRegError::Transport)?;

        let ready = self
            .server
            .wait_for_data(RESPONSE_TIMEOUT)
            .await
            .map_err(EthRegError::Transport)?;
        if !ready {
            tracing::warn!("No response during {} at address {}", opcode, address);
            return Err(EthRegError::NoResponse { opcode, address });
        }

        let mut buf = [0u8; MESSAGE_SIZE];
        let len = self
            .server
            .receive(&mut buf)
            .await
            .map_err(EthRegError::Transport)?;
        if len != MESSAGE_SIZE {
            tracing::warn!("Reply of {} bytes during {} at address {}", len, opcode, address);
            return Err(CodecError::BadLength(len, MESSAGE_SIZE).into());
        }
        let response = decode(&buf)?;

        tracing::debug!(
            "<- {} {} data={:#x} status={}",
            response.opcode,
            Address(response.address),
            response.data,
            response.status
        );

        if !echoes(&request, &response) {
            tracing::warn!("Malformed response during {} at address {}", opcode, address);
            return Err(EthRegError::MalformedResponse { opcode, address });
        }

        if response.status.is_error() {
            tracing::warn!("{} during {} at address {}", response.status, opcode, address);
            return Err(EthRegError::RemoteError {
                opcode,
                address,
                status: response.status,
            });
        }

        Ok(response)
    }

    /// Read a 32-bit register; the upper half of the reply is discarded
    pub async fn read32(&mut self, address: u64) -> EthRegResult<u32> {
        let response = self.transact(RegisterMessage::read32(address)).await?;
        Ok(response.data as u32)
    }

    /// Read a 64-bit register
    pub async fn read64(&mut self, address: u64) -> EthRegResult<u64> {
        let response = self.transact(RegisterMessage::read64(address)).await?;
        Ok(response.data)
    }

    /// Write a 32-bit register
    pub async fn write32(&mut self, address: u64, value: u32) -> EthRegResult<()> {
        self.transact(RegisterMessage::write32(address, value)).await?;
        Ok(())
    }

    /// Write a 64-bit register
    pub async fn write64(&mut self, address: u64, value: u64) -> EthRegResult<()> {
        self.transact(RegisterMessage::write64(address, value)).await?;
        Ok(())
    }
}

/// A reply is valid when it carries our opcode and address, and for
/// writes also the data we wrote
fn echoes(request: &RegisterMessage, response: &RegisterMessage) -> bool {
    let same_target = request.opcode == response.opcode && request.address == response.address;

    if request.opcode.is_write() {
        same_target && request.data == response.data
    } else {
        same_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Opcode, RemoteStatus};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio_test::{assert_err, assert_ok};

    type Responder = Box<dyn FnMut(RegisterMessage) -> Option<Vec<u8>> + Send>;

    /// In-memory device: requests sent on either end are answered by the
    /// responder and queued for receipt
    struct Bus {
        sent: Vec<RegisterMessage>,
        inbox: VecDeque<Vec<u8>>,
        responder: Responder,
    }

    #[derive(Clone)]
    struct MockPort(Arc<Mutex<Bus>>);

    #[async_trait]
    impl Port for MockPort {
        async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            let mut bus = self.0.lock().unwrap();
            let request = decode(bytes).unwrap();
            bus.sent.push(request);
            if let Some(reply) = (bus.responder)(request) {
                bus.inbox.push_back(reply);
            }
            Ok(())
        }

        async fn wait_for_data(&mut self, _timeout: Duration) -> io::Result<bool> {
            Ok(!self.0.lock().unwrap().inbox.is_empty())
        }

        async fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let datagram = self.0.lock().unwrap().inbox.pop_front().unwrap_or_default();
            let len = datagram.len().min(buf.len());
            buf[..len].copy_from_slice(&datagram[..len]);
            Ok(datagram.len())
        }
    }

    fn bus(responder: Responder) -> MockPort {
        MockPort(Arc::new(Mutex::new(Bus {
            sent: Vec::new(),
            inbox: VecDeque::new(),
            responder,
        })))
    }

    /// A well-behaved device backed by a register map
    fn register_file() -> Responder {
        let mut registers: HashMap<u64, u64> = HashMap::new();
        Box::new(move |req| {
            let data = match req.opcode {
                Opcode::Write32 | Opcode::Write64 => {
                    registers.insert(req.address, req.data);
                    req.data
                }
                _ => registers.get(&req.address).copied().unwrap_or(0),
            };
            Some(encode(&req.reply(RemoteStatus::Okay, data)).to_vec())
        })
    }

    /// Answers the probe normally, then hands every later request to `f`
    fn after_probe<F>(mut f: F) -> Responder
    where
        F: FnMut(RegisterMessage) -> Option<Vec<u8>> + Send + 'static,
    {
        let mut probed = false;
        Box::new(move |req| {
            if !probed {
                probed = true;
                return Some(encode(&req.reply(RemoteStatus::Okay, 0)).to_vec());
            }
            f(req)
        })
    }

    async fn connected(responder: Responder) -> (Device<MockPort>, MockPort) {
        let port = bus(responder);
        let device = Device::bootstrap(port.clone(), port.clone()).await.unwrap();
        (device, port)
    }

    fn last_sent(port: &MockPort) -> RegisterMessage {
        *port.0.lock().unwrap().sent.last().unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_sends_probe() {
        let (_device, port) = connected(register_file()).await;

        let sent = port.0.lock().unwrap().sent.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].opcode, Opcode::Read32);
        assert_eq!(sent[0].address, 0);
        assert_eq!(sent[0].data, 0);
        assert_eq!(sent[0].respond_to, LOCAL_PORT);
    }

    #[tokio::test]
    async fn test_bootstrap_accepts_any_reply() {
        let port = bus(Box::new(|_| Some(vec![0xFF; 3])));
        assert_ok!(Device::bootstrap(port.clone(), port).await);
    }

    #[tokio::test]
    async fn test_bootstrap_without_reply() {
        let port = bus(Box::new(|_| None));
        let result = Device::bootstrap(port.clone(), port).await;
        assert!(matches!(result, Err(EthRegError::NoConnectResponse)));
    }

    #[tokio::test]
    async fn test_read32_discards_upper_half() {
        let (mut device, _port) = connected(after_probe(|req| {
            Some(encode(&req.reply(RemoteStatus::Okay, 0xFFFF_0000_1234_5678)).to_vec())
        }))
        .await;

        assert_eq!(device.read32(0x40).await.unwrap(), 0x1234_5678);
    }

    #[tokio::test]
    async fn test_read64_returns_full_value() {
        let (mut device, port) = connected(after_probe(|req| {
            Some(encode(&req.reply(RemoteStatus::Okay, 0xFFFF_0000_1234_5678)).to_vec())
        }))
        .await;

        assert_eq!(device.read64(0x48).await.unwrap(), 0xFFFF_0000_1234_5678);
        assert_eq!(last_sent(&port).opcode, Opcode::Read64);
        assert_eq!(last_sent(&port).address, 0x48);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (mut device, _port) = connected(register_file()).await;

        device.write64(0x100, 0x0123_4567_89AB_CDEF).await.unwrap();
        assert_eq!(device.read64(0x100).await.unwrap(), 0x0123_4567_89AB_CDEF);

        device.write32(0x200, 0xDEAD_BEEF).await.unwrap();
        assert_eq!(device.read32(0x200).await.unwrap(), 0xDEAD_BEEF);
    }

    #[tokio::test]
    async fn test_write32_request_layout() {
        let (mut device, port) = connected(register_file()).await;

        assert_ok!(device.write32(0x1000, 0xCAFE_BABE).await);

        let sent = last_sent(&port);
        assert_eq!(sent.opcode, Opcode::Write32);
        assert_eq!(sent.address, 0x1000);
        assert_eq!(sent.data, 0x0000_0000_CAFE_BABE);
        assert_eq!(sent.respond_to, LOCAL_PORT);
    }

    #[tokio::test]
    async fn test_transact_stamps_respond_to() {
        let (mut device, port) = connected(register_file()).await;

        let mut request = RegisterMessage::read32(0x8);
        request.respond_to = 1234;
        device.transact(request).await.unwrap();

        assert_eq!(last_sent(&port).respond_to, LOCAL_PORT);
    }

    #[tokio::test]
    async fn test_timeout_is_no_response() {
        let (mut device, _port) = connected(after_probe(|_| None)).await;

        let err = assert_err!(device.read64(0x2000).await);
        assert!(matches!(err, EthRegError::NoResponse { .. }));
        assert_eq!(err.opcode(), Some(Opcode::Read64));
        assert_eq!(err.address(), Some(0x2000));
        assert_eq!(err.to_string(), "No response during READ64 at address 0x0000_2000");
    }

    #[tokio::test]
    async fn test_wrong_address_is_malformed() {
        let (mut device, _port) = connected(after_probe(|mut req| {
            req.address += 4;
            Some(encode(&req).to_vec())
        }))
        .await;

        let err = assert_err!(device.read32(0x10).await);
        assert!(matches!(err, EthRegError::MalformedResponse { .. }));
        assert_eq!(err.address(), Some(0x10));
    }

    #[tokio::test]
    async fn test_wrong_opcode_is_malformed() {
        let (mut device, _port) = connected(after_probe(|mut req| {
            req.opcode = Opcode::Read64;
            Some(encode(&req).to_vec())
        }))
        .await;

        let err = assert_err!(device.read32(0x10).await);
        assert!(matches!(err, EthRegError::MalformedResponse { .. }));
        assert_eq!(err.opcode(), Some(Opcode::Read32));
    }

    #[tokio::test]
    async fn test_write_data_mismatch_is_malformed() {
        let (mut device, _port) = connected(after_probe(|req| {
            Some(encode(&req.reply(RemoteStatus::Okay, req.data ^ 1)).to_vec())
        }))
        .await;

        let err = assert_err!(device.write32(0x1000, 0xCAFE_BABE).await);
        assert!(matches!(err, EthRegError::MalformedResponse { .. }));
        assert_eq!(
            err.to_string(),
            "Malformed response during WRITE32 at address 0x0000_1000"
        );
    }

    #[tokio::test]
    async fn test_read_data_is_not_echo_checked() {
        let (mut device, _port) = connected(after_probe(|req| {
            Some(encode(&req.reply(RemoteStatus::Okay, 99)).to_vec())
        }))
        .await;

        assert_eq!(device.read32(0x10).await.unwrap(), 99);
    }

    #[tokio::test]
    async fn test_remote_error_status() {
        let (mut device, _port) = connected(after_probe(|req| {
            let status = if req.address == 0x30 {
                RemoteStatus::DecErr
            } else {
                RemoteStatus::SlvErr
            };
            Some(encode(&req.reply(status, req.data)).to_vec())
        }))
        .await;

        let err = assert_err!(device.write64(0x20, 5).await);
        assert_eq!(err.remote_status(), Some(RemoteStatus::SlvErr));
        assert_eq!(err.to_string(), "SLVERR during WRITE64 at address 0x0000_0020");

        let err = assert_err!(device.read32(0x30).await);
        assert_eq!(err.remote_status().map(RemoteStatus::to_u8), Some(3));
        assert_eq!(err.to_string(), "DECERR during READ32 at address 0x0000_0030");
    }

    #[tokio::test]
    async fn test_malformed_takes_priority_over_status() {
        let (mut device, _port) = connected(after_probe(|mut req| {
            req.address = 0;
            Some(encode(&req.reply(RemoteStatus::SlvErr, 0)).to_vec())
        }))
        .await;

        let err = assert_err!(device.read32(0x10).await);
        assert!(matches!(err, EthRegError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_short_reply_is_framing_error() {
        let (mut device, _port) = connected(after_probe(|req| {
            Some(encode(&req)[..10].to_vec())
        }))
        .await;

        let err = assert_err!(device.read32(0x10).await);
        assert!(matches!(
            err,
            EthRegError::Framing(CodecError::BadLength(10, MESSAGE_SIZE))
        ));
    }

    #[tokio::test]
    async fn test_long_reply_is_framing_error() {
        let (mut device, _port) = connected(after_probe(|req| {
            let mut bytes = encode(&req).to_vec();
            bytes.extend_from_slice(&[0, 0]);
            Some(bytes)
        }))
        .await;

        let err = assert_err!(device.read64(0x10).await);
        assert!(matches!(
            err,
            EthRegError::Framing(CodecError::BadLength(24, MESSAGE_SIZE))
        ));
    }

    /// Fake device on loopback that answers every request with a fixed
    /// value, replying to `reply_to` rather than the respond-to port
    async fn spawn_udp_device(reply_to: std::net::SocketAddr) -> u16 {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            while let Ok((len, _)) = socket.recv_from(&mut buf).await {
                let Ok(req) = decode(&buf[..len]) else { continue };
                let data = if req.opcode.is_write() { req.data } else { 0xA5A5_5A5A };
                let reply = encode(&req.reply(RemoteStatus::Okay, data));
                let _ = socket.send_to(&reply, reply_to).await;
            }
        });

        port
    }

    #[tokio::test]
    async fn test_over_udp_loopback() {
        let server = UdpPort::server(0, Some("127.0.0.1")).await.unwrap();
        let device_port = spawn_udp_device(server.local_addr().unwrap()).await;
        let sender = UdpPort::sender("127.0.0.1", device_port).await.unwrap();

        let mut device = Device::bootstrap(server, sender).await.unwrap();

        assert_eq!(device.read32(0x1234).await.unwrap(), 0xA5A5_5A5A);
        assert_ok!(device.write64(0x1238, 0x1122_3344_5566_7788).await);
    }

    #[tokio::test]
    async fn test_udp_silent_device() {
        let server = UdpPort::server(0, Some("127.0.0.1")).await.unwrap();
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = UdpPort::sender("127.0.0.1", silent.local_addr().unwrap().port())
            .await
            .unwrap();

        let result = Device::bootstrap(server, sender).await;
        assert!(matches!(result, Err(EthRegError::NoConnectResponse)));
    }
}
