//! Protocol codec for encoding/decoding messages
//!
//! The datagram size is the only framing: no length prefix, no checksum.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{Opcode, RegisterMessage, RemoteStatus, MESSAGE_SIZE};

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Bad message length: {0} bytes (expected: {1})")]
    BadLength(usize, usize),
}

/// Encode a message into its 22-byte wire form
pub fn encode(message: &RegisterMessage) -> [u8; MESSAGE_SIZE] {
    let mut buf = BytesMut::with_capacity(MESSAGE_SIZE);
    encode_into(message, &mut buf);

    let mut out = [0u8; MESSAGE_SIZE];
    out.copy_from_slice(&buf);
    out
}

/// Append a message's wire form to a buffer
pub fn encode_into(message: &RegisterMessage, buf: &mut BytesMut) {
    buf.put_u8(message.opcode.to_u8());
    buf.put_u8(message.status.to_u8());
    buf.put_u16(message.respond_to);
    buf.put_u64(message.address);
    buf.put_u64(message.data);
    // reserved
    buf.put_u16(0);
}

/// Decode exactly one message; any other length is a framing error
pub fn decode(mut buf: &[u8]) -> Result<RegisterMessage, CodecError> {
    if buf.len() != MESSAGE_SIZE {
        return Err(CodecError::BadLength(buf.len(), MESSAGE_SIZE));
    }

    let opcode = Opcode::from_u8(buf.get_u8());
    let status = RemoteStatus::from_u8(buf.get_u8());
    let respond_to = buf.get_u16();
    let address = buf.get_u64();
    let data = buf.get_u64();
    // the two reserved bytes are ignored

    Ok(RegisterMessage {
        opcode,
        status,
        respond_to,
        address,
        data,
    })
}
