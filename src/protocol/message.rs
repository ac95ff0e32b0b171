//! Protocol message definitions
//!
//! Defines the register read/write message and its field types.

use std::fmt;

use super::LOCAL_PORT;

/// Operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Write32,
    Write64,
    Read32,
    Read64,
    /// Never produced locally, only seen on decode
    Unknown(u8),
}

impl Opcode {
    pub fn to_u8(self) -> u8 {
        match self {
            Opcode::Write32 => 1,
            Opcode::Write64 => 2,
            Opcode::Read32 => 3,
            Opcode::Read64 => 4,
            Opcode::Unknown(v) => v,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Opcode::Write32,
            2 => Opcode::Write64,
            3 => Opcode::Read32,
            4 => Opcode::Read64,
            v => Opcode::Unknown(v),
        }
    }

    /// Whether the device must echo our data back
    pub fn is_write(self) -> bool {
        matches!(self, Opcode::Write32 | Opcode::Write64)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Read32 => "READ32",
            Opcode::Read64 => "READ64",
            Opcode::Write32 => "WRITE32",
            Opcode::Write64 => "WRITE64",
            Opcode::Unknown(_) => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Device-reported outcome of a transaction, modelled on AXI response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RemoteStatus {
    #[default]
    Okay,
    ExOkay,
    SlvErr,
    DecErr,
    Unknown(u8),
}

impl RemoteStatus {
    pub fn to_u8(self) -> u8 {
        match self {
            RemoteStatus::Okay => 0,
            RemoteStatus::ExOkay => 1,
            RemoteStatus::SlvErr => 2,
            RemoteStatus::DecErr => 3,
            RemoteStatus::Unknown(v) => v,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => RemoteStatus::Okay,
            1 => RemoteStatus::ExOkay,
            2 => RemoteStatus::SlvErr,
            3 => RemoteStatus::DecErr,
            v => RemoteStatus::Unknown(v),
        }
    }

    /// Any nonzero code is a failure, EXOKAY included
    pub fn is_error(self) -> bool {
        self.to_u8() != 0
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteStatus::Okay => "OKAY",
            RemoteStatus::ExOkay => "EXOKAY",
            RemoteStatus::SlvErr => "SLVERR",
            RemoteStatus::DecErr => "DECERR",
            RemoteStatus::Unknown(_) => "UNKNOWN error",
        };
        f.write_str(name)
    }
}

/// A 64-bit register address, displayed as four 16-bit groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a1 = (self.0 >> 48) & 0xFFFF;
        let a2 = (self.0 >> 32) & 0xFFFF;
        let a3 = (self.0 >> 16) & 0xFFFF;
        let a4 = self.0 & 0xFFFF;

        if a1 == 0 && a2 == 0 {
            write!(f, "0x{:04X}_{:04X}", a3, a4)
        } else {
            write!(f, "0x{:04X}_{:04X}_{:04X}_{:04X}", a1, a2, a3, a4)
        }
    }
}

/// The single message exchanged with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMessage {
    pub opcode: Opcode,
    /// Meaningful in responses only
    pub status: RemoteStatus,
    /// Port the device should reply to
    pub respond_to: u16,
    pub address: u64,
    /// Value to write, or the value read; zero-extended for 32-bit ops
    pub data: u64,
}

impl RegisterMessage {
    /// Build a request with everything but the payload zeroed
    pub fn request(opcode: Opcode, address: u64, data: u64) -> Self {
        Self {
            opcode,
            status: RemoteStatus::Okay,
            respond_to: LOCAL_PORT,
            address,
            data,
        }
    }

    pub fn read32(address: u64) -> Self {
        Self::request(Opcode::Read32, address, 0)
    }

    pub fn read64(address: u64) -> Self {
        Self::request(Opcode::Read64, address, 0)
    }

    pub fn write32(address: u64, value: u32) -> Self {
        Self::request(Opcode::Write32, address, u64::from(value))
    }

    pub fn write64(address: u64, value: u64) -> Self {
        Self::request(Opcode::Write64, address, value)
    }

    /// Build the reply a device would send for this request
    pub fn reply(&self, status: RemoteStatus, data: u64) -> Self {
        Self {
            status,
            data,
            ..*self
        }
    }
}
