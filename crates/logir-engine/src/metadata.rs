//! Session metadata file.
//!
//! `session.meta` holds a single frame:
//!
//! ```text
//! [u32 LE payload length][bincode payload][u32 LE CRC-32 of payload]
//! ```

use std::path::Path;

use logir_common::types::{EncodingWidth, FORMAT_VERSION, KeyMode};
use logir_common::utils::error::{DecodeError, Error, Result};
use serde::{Deserialize, Serialize};

use crate::config::{Config, IrFormat};

/// Everything a reader needs to interpret a session's streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Format version the session was written with.
    pub format_version: u16,
    /// Column width flag.
    pub compact_encoding: bool,
    /// Key mode of the writer's dictionaries.
    pub key_mode: KeyMode,
    /// IR layout.
    pub format: IrFormat,
}

impl SessionMetadata {
    /// Captures the persisted parts of `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            format_version: config.format_version,
            compact_encoding: config.compact_encoding,
            key_mode: config.key_mode,
            format: config.format,
        }
    }

    /// Returns the column width.
    #[must_use]
    pub const fn width(&self) -> EncodingWidth {
        EncodingWidth::from_compact(self.compact_encoding)
    }

    /// Serializes the metadata frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let data = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let len = u32::try_from(data.len())
            .map_err(|_| Error::Serialization("metadata payload too large".into()))?;

        let mut frame = Vec::with_capacity(data.len() + 8);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&data);
        frame.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
        Ok(frame)
    }

    /// Parses and verifies a metadata frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Corrupt`] for a truncated frame, trailing
    /// bytes, or a checksum mismatch, and
    /// [`DecodeError::UnsupportedVersion`] for a version this build cannot
    /// read.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (len, rest) = split_u32(frame)?;
        let len = len as usize;
        if rest.len() != len + 4 {
            return Err(DecodeError::corrupt(format!(
                "metadata frame holds {} bytes after its header, expected {}",
                rest.len(),
                len + 4
            ))
            .into());
        }
        let (data, checksum) = rest.split_at(len);
        let (stored, _) = split_u32(checksum)?;
        if stored != crc32fast::hash(data) {
            return Err(DecodeError::corrupt("metadata checksum mismatch").into());
        }

        let (metadata, read): (Self, usize) =
            bincode::serde::decode_from_slice(data, bincode::config::standard())
                .map_err(|e| DecodeError::corrupt(format!("metadata payload: {e}")))?;
        if read != data.len() {
            return Err(DecodeError::corrupt("trailing bytes in metadata payload").into());
        }
        if metadata.format_version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                found: metadata.format_version,
                supported: FORMAT_VERSION,
            }
            .into());
        }
        Ok(metadata)
    }

    /// Writes the metadata frame to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.encode()?)?;
        Ok(())
    }

    /// Reads and verifies the metadata frame at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails verification.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Self::decode(&std::fs::read(path)?)
    }
}

fn split_u32(bytes: &[u8]) -> Result<(u32, &[u8])> {
    match bytes.split_first_chunk::<4>() {
        Some((head, rest)) => Ok((u32::from_le_bytes(*head), rest)),
        None => Err(DecodeError::corrupt("truncated metadata frame").into()),
    }
}
