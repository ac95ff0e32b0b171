//! Error taxonomy for device operations
//!
//! Every failure carries enough of the request to render a diagnostic
//! such as `SLVERR during WRITE32 at address 0x0000_1000`.

use std::io;
use thiserror::Error;

use crate::protocol::{Address, CodecError, Opcode, RemoteStatus};

/// Device errors
#[derive(Error, Debug)]
pub enum EthRegError {
    #[error("Create server failed")]
    ServerCreateFailed(#[source] io::Error),

    #[error("Create client failed")]
    ClientCreateFailed(#[source] io::Error),

    #[error("No response while connecting")]
    NoConnectResponse,

    #[error("No response during {opcode} at address {address}")]
    NoResponse { opcode: Opcode, address: Address },

    #[error("{status} during {opcode} at address {address}")]
    RemoteError {
        opcode: Opcode,
        address: Address,
        status: RemoteStatus,
    },

    #[error("Malformed response during {opcode} at address {address}")]
    MalformedResponse { opcode: Opcode, address: Address },

    #[error("Framing error: {0}")]
    Framing(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[source] io::Error),
}

pub type EthRegResult<T> = Result<T, EthRegError>;

impl EthRegError {
    /// Opcode of the failed request, if the error has one
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            EthRegError::NoResponse { opcode, .. }
            | EthRegError::RemoteError { opcode, .. }
            | EthRegError::MalformedResponse { opcode, .. } => Some(*opcode),
            _ => None,
        }
    }

    /// Address of the failed request, if the error has one
    pub fn address(&self) -> Option<u64> {
        match self {
            EthRegError::NoResponse { address, .. }
            | EthRegError::RemoteError { address, .. }
            | EthRegError::MalformedResponse { address, .. } => Some(address.0),
            _ => None,
        }
    }

    /// Status reported by the device, for `RemoteError` only
    pub fn remote_status(&self) -> Option<RemoteStatus> {
        match self {
            EthRegError::RemoteError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
