//! Port configuration value types.
//!
//! Every type here validates on construction, so a `PortConfig` that
//! exists is one the port handle can be asked to open.

use crate::error::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Baud rates accepted by `BaudRate::new`.
///
/// The POSIX/pyserial standard set plus 250000, which 3D printer
/// firmwares commonly use.
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200, 230400, 250000, 460800, 500000, 576000, 921600, 1000000, 1152000, 1500000, 2000000,
    2500000, 3000000, 3500000, 4000000,
];

/// A baud rate from the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    pub fn new(rate: u32) -> Result<Self, PortError> {
        if SUPPORTED_BAUD_RATES.contains(&rate) {
            Ok(Self(rate))
        } else {
            Err(PortError::InvalidBaudRate(rate))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self(9600)
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = PortError;

    fn try_from(rate: u32) -> Result<Self, Self::Error> {
        Self::new(rate)
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.0
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    #[serde(alias = "N")]
    None,
    #[serde(alias = "O")]
    Odd,
    #[serde(alias = "E")]
    Even,
    #[serde(alias = "M")]
    Mark,
    #[serde(alias = "S")]
    Space,
}

impl Parity {
    /// Single-letter form used in "8N1" style summaries.
    pub fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }

    /// `None` when the serialport driver has no equivalent.
    pub fn to_serialport(self) -> Option<serialport::Parity> {
        match self {
            Parity::None => Some(serialport::Parity::None),
            Parity::Odd => Some(serialport::Parity::Odd),
            Parity::Even => Some(serialport::Parity::Even),
            Parity::Mark | Parity::Space => None,
        }
    }
}

/// Number of data bits per character, 5 through 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DataBits(u8);

impl DataBits {
    pub fn new(bits: u8) -> Result<Self, PortError> {
        if (5..=8).contains(&bits) {
            Ok(Self(bits))
        } else {
            Err(PortError::InvalidDataBits(bits))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn to_serialport(self) -> serialport::DataBits {
        match self.0 {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        }
    }
}

impl Default for DataBits {
    fn default() -> Self {
        Self(8)
    }
}

impl TryFrom<u8> for DataBits {
    type Error = PortError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        bits.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StopBits {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "1.5")]
    OnePointFive,
    #[serde(rename = "2")]
    Two,
}

impl StopBits {
    /// `None` when the serialport driver has no equivalent.
    pub fn to_serialport(self) -> Option<serialport::StopBits> {
        match self {
            StopBits::One => Some(serialport::StopBits::One),
            StopBits::Two => Some(serialport::StopBits::Two),
            StopBits::OnePointFive => None,
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopBits::One => "1",
            StopBits::OnePointFive => "1.5",
            StopBits::Two => "2",
        };
        f.write_str(s)
    }
}

/// Full configuration of one serial connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub port: String,
    pub baud_rate: BaudRate,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    /// Upper bound for one readability wait.
    pub timeout: Duration,
    /// Index into the session's end-of-line table.
    pub eol: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port: String::from("/dev/ttyUSB0"),
            baud_rate: BaudRate::default(),
            parity: Parity::default(),
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
            timeout: Duration::from_secs(3),
            eol: 0,
        }
    }
}

impl PortConfig {
    /// The settings reported in configuration-changed notifications.
    pub fn line_settings(&self) -> LineSettings {
        LineSettings {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    /// True when opening with `other` would produce an identical device.
    /// The end-of-line choice never reaches the driver, so it is ignored.
    pub fn same_device_settings(&self, other: &PortConfig) -> bool {
        self.port == other.port
            && self.line_settings() == other.line_settings()
            && self.timeout == other.timeout
    }
}

/// Baud rate and framing of an open line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSettings {
    pub baud_rate: BaudRate,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl fmt::Display for LineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} baud {}{}{}",
            self.baud_rate,
            self.data_bits.get(),
            self.parity.letter(),
            self.stop_bits
        )
    }
}
