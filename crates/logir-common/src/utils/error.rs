//! Error types for Logir.
//!
//! Token-level and encoding-level conditions never surface here: a token that
//! does not fit an inline numeric encoding simply falls through to the
//! dictionary. Only width, capacity, I/O, and decoding failures cross module
//! boundaries.

use crate::types::DictionaryKind;
use thiserror::Error;

/// Result type alias for Logir operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Sink write, flush, truncate, or file-open failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A new dictionary ID would not fit the ID column width.
    ///
    /// Fatal for the record being appended; the session keeps accepting
    /// records.
    #[error("{dictionary} dictionary overflow: id {id} exceeds column maximum {max}")]
    DictionaryOverflow {
        /// Dictionary that ran out of IDs.
        dictionary: DictionaryKind,
        /// ID that would have been assigned.
        id: u64,
        /// Largest ID the column can hold.
        max: u64,
    },

    /// A dictionary entry is too long for its u16 length prefix.
    ///
    /// Fatal for the record being appended; the session keeps accepting
    /// records.
    #[error("{dictionary} dictionary entry of {len} bytes exceeds the {max}-byte limit", max = u16::MAX)]
    EntryTooLong {
        /// Dictionary the entry was destined for.
        dictionary: DictionaryKind,
        /// Entry length in bytes.
        len: usize,
    },

    /// A fixed-capacity sink has no room for the record.
    #[error("{stream} capacity exceeded: {requested} bytes requested, {available} of {capacity} available")]
    CapacityExceeded {
        /// Name of the stream that is full.
        stream: String,
        /// Total capacity of the stream in bytes.
        capacity: u64,
        /// Bytes still available.
        available: u64,
        /// Bytes the write needed.
        requested: u64,
    },

    /// Decoding error.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The session was already closed.
    #[error("Session is closed")]
    SessionClosed,

    /// An earlier I/O or capacity failure left the session unusable.
    #[error("Session is poisoned by an earlier write failure")]
    SessionPoisoned,
}

impl Error {
    /// Returns whether only the failing record was dropped.
    ///
    /// Record-fatal errors leave dictionaries and streams untouched, so the
    /// session may continue to accept records.
    #[must_use]
    pub fn is_record_fatal(&self) -> bool {
        matches!(self, Self::DictionaryOverflow { .. } | Self::EntryTooLong { .. })
    }

    /// Returns whether the error leaves the session in an undefined state.
    #[must_use]
    pub fn poisons_session(&self) -> bool {
        matches!(self, Self::Io(_) | Self::CapacityExceeded { .. })
    }
}

/// Errors raised while reading an IR back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A stream is truncated or internally inconsistent.
    #[error("Corrupt stream: {0}")]
    Corrupt(String),

    /// An ID that was never assigned by the dictionary.
    #[error("{dictionary} dictionary has no id {id} ({len} entries)")]
    UnassignedId {
        /// Dictionary the ID was looked up in.
        dictionary: DictionaryKind,
        /// The unknown ID.
        id: u64,
        /// Number of entries in the dictionary.
        len: usize,
    },

    /// A seen-before reference whose content was never transmitted.
    #[error("{dictionary} reference to content that was never transmitted")]
    UnknownReference {
        /// Dictionary the reference was resolved against.
        dictionary: DictionaryKind,
    },

    /// Metadata written by an unsupported format version.
    #[error("Unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the metadata.
        found: u16,
        /// Version this build reads.
        supported: u16,
    },
}

impl DecodeError {
    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let overflow = Error::DictionaryOverflow {
            dictionary: DictionaryKind::Logtype,
            id: 65536,
            max: 65535,
        };
        assert!(overflow.is_record_fatal());
        assert!(!overflow.poisons_session());

        let io = Error::Io(std::io::Error::other("disk full"));
        assert!(io.poisons_session());
        assert!(!io.is_record_fatal());

        let full = Error::CapacityExceeded {
            stream: "ts.bin".to_string(),
            capacity: 16,
            available: 0,
            requested: 8,
        };
        assert!(full.poisons_session());
    }

    #[test]
    fn test_error_display() {
        let err = Error::EntryTooLong {
            dictionary: DictionaryKind::Variable,
            len: 70000,
        };
        assert_eq!(
            err.to_string(),
            "variable dictionary entry of 70000 bytes exceeds the 65535-byte limit"
        );

        let err: Error = DecodeError::UnassignedId {
            dictionary: DictionaryKind::Logtype,
            id: 3,
            len: 2,
        }
        .into();
        assert_eq!(err.to_string(), "logtype dictionary has no id 3 (2 entries)");
    }
}
