//! Text charsets supported by the read/write text operations.

use serde::{Deserialize, Serialize};

/// Charset used when reading or writing text files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Charset {
    /// UTF-8 (the default).
    #[default]
    Utf8,
    /// UTF-16, little endian, no BOM handling.
    Utf16Le,
    /// UTF-16, big endian, no BOM handling.
    Utf16Be,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
}

impl Charset {
    /// Decode raw bytes into a string.
    ///
    /// Returns `None` when the bytes are not valid in this charset.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).ok(),
            Self::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return None;
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).ok()
            }
            Self::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return None;
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).ok()
            }
            Self::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    /// Encode a string into raw bytes.
    ///
    /// Returns `None` when the content cannot be represented (Latin-1 only).
    pub fn encode(&self, content: &str) -> Option<Vec<u8>> {
        match self {
            Self::Utf8 => Some(content.as_bytes().to_vec()),
            Self::Utf16Le => Some(
                content
                    .encode_utf16()
                    .flat_map(|u| u.to_le_bytes())
                    .collect(),
            ),
            Self::Utf16Be => Some(
                content
                    .encode_utf16()
                    .flat_map(|u| u.to_be_bytes())
                    .collect(),
            ),
            Self::Latin1 => content
                .chars()
                .map(|c| u8::try_from(c as u32).ok())
                .collect(),
        }
    }
}

impl std::fmt::Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Latin1 => "ISO-8859-1",
        };
        f.write_str(name)
    }
}
