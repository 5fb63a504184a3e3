//! Turns raw bytes into display text and colored hex rows, and display
//! text back into bytes for sending.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Highlight colors keyed by byte value.
pub type ColorMap = BTreeMap<u8, String>;

/// Bytes per hex row unless configured otherwise.
pub const DEFAULT_ROW_WIDTH: usize = 16;

/// How incoming bytes become display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DecodeMode {
    /// Raw bytes shown as uppercase hex, never interpreted as text.
    #[serde(rename = "hex", alias = "HEX")]
    Hex,
    #[default]
    #[serde(rename = "ASCII", alias = "ascii")]
    Ascii,
    #[serde(rename = "UTF-8", alias = "utf-8", alias = "utf8")]
    Utf8,
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("byte 0x{byte:02X} at offset {offset} is not ASCII")]
    NotAscii { byte: u8, offset: usize },

    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("character {0:?} can't be encoded as ASCII")]
    NotAscii(char),

    #[error("invalid hex input: {0}")]
    InvalidHex(String),
}

/// Decode `raw` per `mode`.
pub fn try_decode(raw: &[u8], mode: DecodeMode) -> Result<String, DecodeError> {
    match mode {
        DecodeMode::Hex => Ok(hex::encode_upper(raw)),
        DecodeMode::Ascii => {
            if let Some(offset) = raw.iter().position(|b| !b.is_ascii()) {
                return Err(DecodeError::NotAscii {
                    byte: raw[offset],
                    offset,
                });
            }
            Ok(raw.iter().map(|&b| b as char).collect())
        }
        DecodeMode::Utf8 => Ok(std::str::from_utf8(raw)?.to_string()),
    }
}

/// Decode `raw` per `mode`, degrading to an empty string on failure.
pub fn decode(raw: &[u8], mode: DecodeMode) -> String {
    try_decode(raw, mode).unwrap_or_else(|e| {
        warn!(error = %e, bytes = raw.len(), ?mode, "fail to decode bytes");
        String::new()
    })
}

/// Encode outgoing text per `mode`. In hex mode the text is read as hex
/// digit pairs; whitespace between them is ignored.
pub fn encode(text: &str, mode: DecodeMode) -> Result<Vec<u8>, EncodeError> {
    match mode {
        DecodeMode::Hex => {
            let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            hex::decode(&digits).map_err(|e| EncodeError::InvalidHex(e.to_string()))
        }
        DecodeMode::Ascii => match text.chars().find(|c| !c.is_ascii()) {
            Some(ch) => Err(EncodeError::NotAscii(ch)),
            None => Ok(text.as_bytes().to_vec()),
        },
        DecodeMode::Utf8 => Ok(text.as_bytes().to_vec()),
    }
}

/// A highlighted two-digit byte inside a [`HexRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorSpan {
    /// Byte offset of the first hex digit in `HexRow::text`.
    pub start: usize,
    pub end: usize,
    pub color: String,
}

/// One fixed-width row of the hex view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HexRow {
    pub text: String,
    pub spans: Vec<ColorSpan>,
}

impl HexRow {
    /// Render with highlighted bytes wrapped in HTML color spans.
    pub fn to_markup(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + self.spans.len() * 32);
        let mut cursor = 0;
        for span in &self.spans {
            out.push_str(&self.text[cursor..span.start]);
            out.push_str(&format!(
                "<span style=\"color: {}\">{}</span>",
                span.color,
                &self.text[span.start..span.end]
            ));
            cursor = span.end;
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

impl fmt::Display for HexRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Lays bytes out as hex rows: a space after every second byte, a new
/// row after every `width` bytes.
#[derive(Debug, Clone)]
pub struct HexFormatter {
    width: usize,
    colors: ColorMap,
}

impl Default for HexFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_WIDTH, default_colors())
    }
}

impl HexFormatter {
    /// A zero width is treated as one byte per row.
    pub fn new(width: usize, colors: ColorMap) -> Self {
        Self {
            width: width.max(1),
            colors,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn colorize(&self, bytes: &[u8]) -> Vec<HexRow> {
        let mut rows = Vec::with_capacity(bytes.len() / self.width + 1);
        let mut row = HexRow::default();

        for (i, byte) in bytes.iter().enumerate() {
            if let Some(color) = self.colors.get(byte) {
                let start = row.text.len();
                row.spans.push(ColorSpan {
                    start,
                    end: start + 2,
                    color: color.clone(),
                });
            }
            row.text.push_str(&format!("{byte:02X}"));

            if (i + 1) % 2 == 0 {
                row.text.push(' ');
            }
            if (i + 1) % self.width == 0 {
                rows.push(std::mem::take(&mut row));
            }
        }

        if !row.text.is_empty() {
            rows.push(row);
        }
        rows
    }
}

/// Colors for CR and LF, the bytes a line-oriented device sends most.
pub fn default_colors() -> ColorMap {
    ColorMap::from([
        (0x0A, "#61AFEF".to_string()),
        (0x0D, "#E06C75".to_string()),
    ])
}

/// Output of one read event. Immutable once queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedResult {
    pub plain: String,
    pub rows: Vec<HexRow>,
}

/// Decoder plus formatter, configured once per session.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    mode: DecodeMode,
    formatter: HexFormatter,
}

impl Decoder {
    pub fn new(mode: DecodeMode, formatter: HexFormatter) -> Self {
        Self { mode, formatter }
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Never fails: a decode error yields empty text, the hex rows are
    /// still built from the raw bytes.
    pub fn process(&self, raw: &[u8]) -> DecodedResult {
        DecodedResult {
            plain: decode(raw, self.mode),
            rows: self.formatter.colorize(raw),
        }
    }
}
