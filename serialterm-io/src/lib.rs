//! # Serialterm IO
//!
//! The Hardware Bridge.
//! Owns the serial device: opening, closing, reconfiguring, draining input
//! and writing output, plus discovery of the devices the OS reports.
//! Everything here is blocking; the session engine in `serialterm-core`
//! drives it from its own worker thread.

pub mod config;
pub mod error;
pub mod port;
pub mod scanner;

pub use config::{
    BaudRate, DataBits, LineSettings, Parity, PortConfig, SUPPORTED_BAUD_RATES, StopBits,
};
pub use error::{ErrorCode, PortError};
pub use port::{PortHandle, SerialBackend, SerialDevice, SystemBackend};
pub use scanner::{DeviceInfo, DeviceList, DeviceScanner};
