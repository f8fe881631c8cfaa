//! Character encodings for the delimited text artifact.
//!
//! The default is the LEGACY single-byte code page windows-1252, which older
//! spreadsheet importers read without auto-detection. UTF-8, with or without
//! a byte-order mark, is available for modern consumers.

use crate::error::{Result, SqlSheetError};
use encoding_rs::{EncoderResult, Encoding, UTF_8, WINDOWS_1252};
use std::fmt;
use std::str::FromStr;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Byte substituted for characters a legacy code page cannot represent.
const REPLACEMENT: u8 = b'?';

/// Encoding applied to the delimited text artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 without byte-order mark.
    Utf8,
    /// UTF-8 with byte-order mark.
    Utf8Bom,
    /// A single-byte legacy code page.
    Legacy(&'static Encoding),
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::Legacy(WINDOWS_1252)
    }
}

impl FromStr for TextEncoding {
    type Err = SqlSheetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => return Ok(Self::Utf8),
            "utf-8-bom" | "utf8-bom" | "utf8bom" => return Ok(Self::Utf8Bom),
            _ => {}
        }

        match Encoding::for_label(s.trim().as_bytes()) {
            Some(enc) if enc == UTF_8 => Ok(Self::Utf8),
            Some(enc) if enc.is_single_byte() => Ok(Self::Legacy(enc)),
            Some(enc) => Err(SqlSheetError::config(format!(
                "Encoding '{}' is not supported; use utf-8, utf-8-bom or a single-byte code page",
                enc.name()
            ))),
            None => Err(SqlSheetError::config(format!("Unknown encoding '{s}'"))),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => f.write_str("utf-8"),
            Self::Utf8Bom => f.write_str("utf-8-bom"),
            Self::Legacy(enc) => write!(f, "{} (legacy)", enc.name().to_lowercase()),
        }
    }
}

impl TextEncoding {
    /// Encodes `text`. Returns the bytes and the number of characters that
    /// had to be replaced with `?`.
    pub fn encode(&self, text: &str) -> (Vec<u8>, usize) {
        match self {
            Self::Utf8 => (text.as_bytes().to_vec(), 0),
            Self::Utf8Bom => {
                let mut bytes = Vec::with_capacity(UTF8_BOM.len() + text.len());
                bytes.extend_from_slice(UTF8_BOM);
                bytes.extend_from_slice(text.as_bytes());
                (bytes, 0)
            }
            Self::Legacy(enc) => encode_single_byte(enc, text),
        }
    }

    /// Decodes bytes previously produced by [`TextEncoding::encode`].
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 | Self::Utf8Bom => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8(body.to_vec())
                    .map_err(|e| SqlSheetError::formatting(format!("Invalid UTF-8 input: {e}")))
            }
            Self::Legacy(enc) => Ok(enc.decode_without_bom_handling(bytes).0.into_owned()),
        }
    }
}

fn encode_single_byte(encoding: &'static Encoding, text: &str) -> (Vec<u8>, usize) {
    let mut encoder = encoding.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4096];
    let mut input = text;
    let mut replaced = 0;

    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(input, &mut buf, true);
        out.extend_from_slice(&buf[..written]);
        input = &input[read..];

        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => {
                out.push(REPLACEMENT);
                replaced += 1;
            }
        }
    }

    (out, replaced)
}
