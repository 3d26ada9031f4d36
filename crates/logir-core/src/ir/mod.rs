//! Binary intermediate representation.
//!
//! Two layouts share the same message encoding:
//!
//! - [`columnar`] - two dictionaries plus timestamp, logtype-id, and
//!   variable columns, each in its own stream
//! - [`stream`] - one self-describing stream of opcodes where dictionary
//!   content travels inline the first time it is seen
//!
//! [`decoder`] reads the columnar layout back to records.

pub mod columnar;
pub mod decoder;
pub mod stream;

pub use columnar::{ColumnarSinks, ColumnarWriter, Columns};
pub use decoder::{ColumnSlices, Decoder};
pub use stream::{Reference, StreamEvent, StreamReader, StreamWriter};

use logir_common::utils::error::{Error, Result};

use crate::encoding::EncodedMessage;
use crate::storage::ByteSink;

/// Stream names within a session.
pub mod files {
    use logir_common::types::DictionaryKind;

    /// Logtype dictionary entries.
    pub const LOGTYPE_DICTIONARY: &str = "logtype.dict";
    /// Variable dictionary entries.
    pub const VARIABLE_DICTIONARY: &str = "variable.dict";
    /// Timestamp column.
    pub const TIMESTAMPS: &str = "ts.bin";
    /// Logtype-id column.
    pub const LOGTYPE_IDS: &str = "logtype.bin";
    /// Variable column.
    pub const VARIABLES: &str = "variable.bin";
    /// Combined opcode stream.
    pub const COMBINED: &str = "ir.stream";

    /// Returns the dictionary stream name for `kind`.
    #[must_use]
    pub const fn dictionary(kind: DictionaryKind) -> &'static str {
        match kind {
            DictionaryKind::Logtype => LOGTYPE_DICTIONARY,
            DictionaryKind::Variable => VARIABLE_DICTIONARY,
        }
    }
}

/// Destination for encoded records.
pub trait IrWriter: Send {
    /// Writes one record.
    ///
    /// `encoded` must have been produced from `message` by an encoder of the
    /// writer's width. On error nothing of the record is written, except
    /// when an I/O failure interrupts the final append.
    ///
    /// # Errors
    ///
    /// Record-fatal dictionary errors, or session-fatal I/O and capacity
    /// errors.
    fn write_record(&mut self, timestamp: i64, message: &[u8], encoded: &EncodedMessage) -> Result<()>;

    /// Terminates and finishes every stream. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first sink error; every sink is still finished.
    fn finish(&mut self) -> Result<()>;

    /// Returns counters for the streams written so far.
    fn stats(&self) -> WriterStats;
}

/// Bytes written to one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    /// Stream name, see [`files`].
    pub name: &'static str,
    /// Bytes written.
    pub bytes: u64,
}

/// Counters reported by an [`IrWriter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Records written.
    pub records: u64,
    /// Distinct logtypes.
    pub logtypes: u64,
    /// Distinct dictionary variables.
    pub dictionary_variables: u64,
    /// Bytes per stream.
    pub streams: Vec<StreamStats>,
}

impl WriterStats {
    /// Returns the total bytes across all streams.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.streams.iter().map(|s| s.bytes).sum()
    }
}

/// Fails if a bounded sink cannot take `requested` more bytes.
pub(crate) fn ensure_capacity(stream: &str, sink: &dyn ByteSink, requested: u64) -> Result<()> {
    match sink.remaining() {
        Some(available) if requested > available => Err(Error::CapacityExceeded {
            stream: stream.to_string(),
            capacity: sink.written() + available,
            available,
            requested,
        }),
        _ => Ok(()),
    }
}

/// Narrows a variable value to the compact column.
pub(crate) fn compact_value(value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        Error::Config(format!(
            "variable value {value} does not fit the compact column; encoder and writer widths differ"
        ))
    })
}

/// Returns the first error among sink results, logging the rest.
///
/// Callers evaluate every `finish` before calling this, so one failing sink
/// never leaves the others unflushed.
pub(crate) fn first_error(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let mut first = Ok(());
    for result in results {
        if let Err(err) = result {
            if first.is_ok() {
                first = Err(err);
            } else {
                tracing::warn!(error = %err, "additional failure while finishing IR streams");
            }
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySink;
    use logir_common::types::DictionaryKind;

    #[test]
    fn test_ensure_capacity() {
        let unbounded = MemorySink::new();
        assert!(ensure_capacity("x", &unbounded, u64::MAX).is_ok());

        let mut bounded = MemorySink::bounded(10);
        bounded.put(b"1234").unwrap();
        assert!(ensure_capacity("ts.bin", &bounded, 6).is_ok());
        let err = ensure_capacity("ts.bin", &bounded, 7).unwrap_err();
        match err {
            Error::CapacityExceeded {
                stream,
                capacity,
                available,
                requested,
            } => {
                assert_eq!(stream, "ts.bin");
                assert_eq!((capacity, available, requested), (10, 6, 7));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compact_value() {
        assert_eq!(compact_value(-5).unwrap(), -5);
        assert!(compact_value(i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(files::dictionary(DictionaryKind::Logtype), "logtype.dict");
        assert_eq!(files::dictionary(DictionaryKind::Variable), "variable.dict");
    }
}
