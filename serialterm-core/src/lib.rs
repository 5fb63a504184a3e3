//! # Serialterm Core
//!
//! The serial session engine. A dedicated worker thread owns the port,
//! polls the device list, reads and decodes whatever arrives and queues
//! it for the display. The display drives it through [`SessionControl`]
//! and listens on the [`SessionEvent`] stream.

pub mod console;
pub mod control;
pub mod decoder;
pub mod engine;
pub mod events;
pub mod logging;
pub mod settings;

// Re-export the main structs so users can just use `serialterm_core::SessionEngine`
pub use control::SessionControl;
pub use decoder::{DecodeMode, DecodedResult, Decoder, HexFormatter, HexRow};
pub use engine::{OutputQueue, SessionEngine};
pub use events::{SessionEvent, SessionState};
pub use settings::{Settings, SettingsError};

pub use serialterm_io::{
    BaudRate, DeviceInfo, DeviceList, ErrorCode, LineSettings, PortConfig, PortError,
    SerialBackend, SerialDevice,
};
