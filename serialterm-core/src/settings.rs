//! Startup configuration, read once from a JSON file.

use crate::decoder::{ColorMap, DEFAULT_ROW_WIDTH, DecodeMode, Decoder, HexFormatter, default_colors};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serialterm_io::{BaudRate, DataBits, Parity, PortConfig, StopBits};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("can't read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Device opened on resume.
    pub port: String,
    pub baud_rate: BaudRate,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    /// Upper bound of one readability wait, in milliseconds.
    pub timeout_ms: u64,
    /// Index into `eol_table` of the terminator appended to writes.
    pub eol: usize,
    pub eol_table: Vec<String>,
    pub decode_mode: DecodeMode,
    /// Bytes per row of the hex view.
    pub hex_row_width: usize,
    /// Byte value -> display color.
    pub colors: ColorMap,
    pub scan_interval_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let port = PortConfig::default();
        Self {
            port: port.port,
            baud_rate: port.baud_rate,
            parity: port.parity,
            data_bits: port.data_bits,
            stop_bits: port.stop_bits,
            timeout_ms: port.timeout.as_millis() as u64,
            eol: port.eol,
            eol_table: ["", "\n", "\r", "\r\n"].map(String::from).to_vec(),
            decode_mode: DecodeMode::default(),
            hex_row_width: DEFAULT_ROW_WIDTH,
            colors: default_colors(),
            scan_interval_ms: 1000,
            poll_interval_ms: 20,
        }
    }
}

impl Settings {
    /// `<config dir>/serialterm/settings.json` on this platform.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "DrTomLLC", "serialterm")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file means defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        match Self::load(path) {
            Err(SettingsError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.eol >= self.eol_table.len() {
            return Err(SettingsError::Invalid(format!(
                "eol index {} is outside the eol table (len {})",
                self.eol,
                self.eol_table.len()
            )));
        }
        if self.hex_row_width == 0 {
            return Err(SettingsError::Invalid("hex_row_width must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::Invalid("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn port_config(&self) -> PortConfig {
        PortConfig {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            parity: self.parity,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            timeout: self.timeout(),
            eol: self.eol,
        }
    }

    pub fn decoder(&self) -> Decoder {
        Decoder::new(
            self.decode_mode,
            HexFormatter::new(self.hex_row_width, self.colors.clone()),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
