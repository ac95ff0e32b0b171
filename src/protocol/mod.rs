//! Protocol module - Defines the wire protocol for register access
//!
//! Every request and every response is a single fixed-size UDP datagram:
//! - 1 byte opcode
//! - 1 byte remote status (responses only)
//! - 2 bytes respond-to port (big-endian)
//! - 8 bytes register address (big-endian)
//! - 8 bytes data (big-endian)
//! - 2 reserved bytes (zero)

mod message;
mod codec;

pub use message::*;
pub use codec::*;

use std::time::Duration;

/// Port we listen on for replies; stamped into every request
pub const LOCAL_PORT: u16 = 32012;

/// Port the remote device listens on
pub const REMOTE_PORT: u16 = 0x0122;

/// Size of every message on the wire
pub const MESSAGE_SIZE: usize = 22;

/// How long to wait for a reply, both while connecting and per transaction
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);
