use std::fmt;
use std::io;
use thiserror::Error;

/// Category of a port fault as reported on the session event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Failed to open the port.
    Open,
    /// Failed to close the port.
    Close,
    /// Failed to read from the port.
    Read,
    /// Failed to write to the port.
    Write,
    /// A reconfiguration request was rejected.
    Config,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Open => "open",
            ErrorCode::Close => "close",
            ErrorCode::Read => "read",
            ErrorCode::Write => "write",
            ErrorCode::Config => "config",
        };
        f.write_str(name)
    }
}

/// Errors produced by the port handle and the port configuration types.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("can't open port {port}: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("can't close port {port}: {source}")]
    PortClose {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("fail reading from port {port}: {source}")]
    Read {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("fail writing to port {port}: {reason}")]
    Write { port: String, reason: String },

    #[error("port isn't open")]
    NotOpen,

    #[error("unsupported baud rate: {0}")]
    InvalidBaudRate(u32),

    #[error("unsupported number of data bits: {0} (expected 5-8)")]
    InvalidDataBits(u8),

    #[error("end of line index {index} is out of range (0..{len})")]
    InvalidEol { index: usize, len: usize },
}

impl PortError {
    /// Maps the error onto the code consumers see in `Error` events.
    pub fn code(&self) -> ErrorCode {
        match self {
            PortError::PortUnavailable { .. } => ErrorCode::Open,
            PortError::PortClose { .. } => ErrorCode::Close,
            PortError::Read { .. } => ErrorCode::Read,
            PortError::Write { .. } | PortError::NotOpen => ErrorCode::Write,
            PortError::InvalidBaudRate(_)
            | PortError::InvalidDataBits(_)
            | PortError::InvalidEol { .. } => ErrorCode::Config,
        }
    }
}
