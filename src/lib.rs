//! EthReg - Register access over UDP
//!
//! A client for a fixed-size binary protocol that reads and writes 32-bit
//! and 64-bit registers on a remote device, such as an AXI-mapped
//! peripheral reachable over Ethernet.
//!
//! ```no_run
//! # async fn demo() -> ethreg::EthRegResult<()> {
//! let mut device = ethreg::Device::connect("12.12.12.7", None).await?;
//! let id = device.read32(0x1000).await?;
//! device.write32(0x1004, id | 1).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod network;
pub mod protocol;

pub use device::Device;
pub use error::{EthRegError, EthRegResult};
