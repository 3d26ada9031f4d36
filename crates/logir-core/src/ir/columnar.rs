//! Columnar IR writer.
//!
//! A record becomes one timestamp, one logtype ID, and one column value per
//! variable:
//!
//! | Stream | Entry (compact) | Entry (standard) |
//! |--------|-----------------|------------------|
//! | `ts.bin` | i64 BE | i64 BE |
//! | `logtype.bin` | u16 BE | u32 BE |
//! | `variable.bin` | i32 BE | i64 BE |
//! | `logtype.dict`, `variable.dict` | `u16 BE len, bytes` | `u16 BE len, bytes` |

use byteorder::{BigEndian, ByteOrder};
use logir_common::types::{DictionaryId, DictionaryKind, EncodingWidth, KeyMode};
use logir_common::utils::error::Result;
use smallvec::SmallVec;

use super::{IrWriter, StreamStats, WriterStats, compact_value, ensure_capacity, files, first_error};
use crate::dictionary::{CompressionDictionary, PendingEntries};
use crate::encoding::{EncodedMessage, EncodedVariable};
use crate::storage::ByteSink;

/// The five sinks of a columnar session.
pub struct ColumnarSinks {
    /// `logtype.dict`
    pub logtype_dictionary: Box<dyn ByteSink>,
    /// `variable.dict`
    pub variable_dictionary: Box<dyn ByteSink>,
    /// `ts.bin`
    pub timestamps: Box<dyn ByteSink>,
    /// `logtype.bin`
    pub logtype_ids: Box<dyn ByteSink>,
    /// `variable.bin`
    pub variables: Box<dyn ByteSink>,
}

/// The three per-record columns.
///
/// These are the raw primitives: they append without any dictionary
/// bookkeeping or capacity precheck. [`ColumnarWriter`] drives them for
/// encoded messages; the stream aggregator drives them with IDs from its
/// own dictionaries.
pub struct Columns {
    width: EncodingWidth,
    timestamps: Box<dyn ByteSink>,
    logtype_ids: Box<dyn ByteSink>,
    variables: Box<dyn ByteSink>,
    records: u64,
}

impl std::fmt::Debug for Columns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Columns")
            .field("width", &self.width)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl Columns {
    /// Creates columns of the given width.
    #[must_use]
    pub fn new(
        width: EncodingWidth,
        timestamps: Box<dyn ByteSink>,
        logtype_ids: Box<dyn ByteSink>,
        variables: Box<dyn ByteSink>,
    ) -> Self {
        Self {
            width,
            timestamps,
            logtype_ids,
            variables,
            records: 0,
        }
    }

    /// Returns the column width.
    #[must_use]
    pub fn width(&self) -> EncodingWidth {
        self.width
    }

    /// Returns the number of timestamps written, one per record.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Appends a record timestamp.
    ///
    /// # Errors
    ///
    /// Returns the sink's error.
    pub fn put_timestamp(&mut self, timestamp: i64) -> Result<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_i64(&mut buf, timestamp);
        self.timestamps.put(&buf)?;
        self.records += 1;
        Ok(())
    }

    /// Appends a logtype ID.
    ///
    /// # Errors
    ///
    /// Returns the sink's error.
    pub fn put_logtype(&mut self, id: DictionaryId) -> Result<()> {
        let mut buf = [0u8; 4];
        match self.width {
            EncodingWidth::Compact => {
                // Logtype dictionary caps compact IDs at u16::MAX
                BigEndian::write_u16(&mut buf, id.as_u32() as u16);
                self.logtype_ids.put(&buf[..2])
            }
            EncodingWidth::Standard => {
                BigEndian::write_u32(&mut buf, id.as_u32());
                self.logtype_ids.put(&buf)
            }
        }
    }

    /// Appends an inline integer value.
    ///
    /// # Errors
    ///
    /// Returns the sink's error, or [`Error::Config`](logir_common::Error::Config)
    /// if the value does not fit a compact column.
    pub fn put_integer_variable(&mut self, value: i64) -> Result<()> {
        self.put_value(value)
    }

    /// Appends a packed decimal value.
    ///
    /// # Errors
    ///
    /// See [`put_integer_variable`](Self::put_integer_variable).
    pub fn put_decimal_variable(&mut self, packed: i64) -> Result<()> {
        self.put_value(packed)
    }

    /// Appends a variable dictionary ID.
    ///
    /// # Errors
    ///
    /// See [`put_integer_variable`](Self::put_integer_variable).
    pub fn put_dictionary_variable(&mut self, id: DictionaryId) -> Result<()> {
        self.put_value(i64::from(id.as_u32()))
    }

    /// Checks that bounded sinks can take one more record with `values`
    /// variable values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`](logir_common::Error::CapacityExceeded)
    /// naming the first full column.
    pub fn ensure_room(&self, values: usize) -> Result<()> {
        ensure_capacity(files::TIMESTAMPS, self.timestamps.as_ref(), 8)?;
        ensure_capacity(
            files::LOGTYPE_IDS,
            self.logtype_ids.as_ref(),
            self.width.logtype_id_bytes() as u64,
        )?;
        ensure_capacity(
            files::VARIABLES,
            self.variables.as_ref(),
            (values * self.width.variable_bytes()) as u64,
        )
    }

    /// Returns bytes written per column.
    #[must_use]
    pub fn stream_stats(&self) -> [StreamStats; 3] {
        [
            StreamStats {
                name: files::TIMESTAMPS,
                bytes: self.timestamps.written(),
            },
            StreamStats {
                name: files::LOGTYPE_IDS,
                bytes: self.logtype_ids.written(),
            },
            StreamStats {
                name: files::VARIABLES,
                bytes: self.variables.written(),
            },
        ]
    }

    /// Finishes all three sinks.
    ///
    /// # Errors
    ///
    /// Returns the first sink error; every sink is still finished.
    pub fn finish(&mut self) -> Result<()> {
        first_error([
            self.timestamps.finish(),
            self.logtype_ids.finish(),
            self.variables.finish(),
        ])
    }

    fn put_value(&mut self, value: i64) -> Result<()> {
        let mut buf = [0u8; 8];
        match self.width {
            EncodingWidth::Compact => {
                BigEndian::write_i32(&mut buf, compact_value(value)?);
                self.variables.put(&buf[..4])
            }
            EncodingWidth::Standard => {
                BigEndian::write_i64(&mut buf, value);
                self.variables.put(&buf)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StagedValue {
    Integer(i64),
    Decimal(i64),
    Dictionary(DictionaryId),
}

/// Writes records as dictionaries plus columns.
///
/// Each record is staged completely before anything is appended: the
/// logtype and dictionary variables are resolved, the new entries and
/// column values are checked against every bounded sink, and only then are
/// dictionaries committed and columns appended.
pub struct ColumnarWriter {
    logtypes: CompressionDictionary,
    variables: CompressionDictionary,
    columns: Columns,
    pending_logtypes: PendingEntries,
    pending_variables: PendingEntries,
    staged: SmallVec<[StagedValue; 8]>,
    finished: bool,
}

impl std::fmt::Debug for ColumnarWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnarWriter")
            .field("logtypes", &self.logtypes)
            .field("variables", &self.variables)
            .field("columns", &self.columns)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl ColumnarWriter {
    /// Creates a writer over `sinks`.
    #[must_use]
    pub fn new(width: EncodingWidth, key_mode: KeyMode, sinks: ColumnarSinks) -> Self {
        Self {
            logtypes: CompressionDictionary::new(
                DictionaryKind::Logtype,
                key_mode,
                width.max_logtype_id(),
                sinks.logtype_dictionary,
            ),
            variables: CompressionDictionary::new(
                DictionaryKind::Variable,
                key_mode,
                width.max_variable_id(),
                sinks.variable_dictionary,
            ),
            columns: Columns::new(width, sinks.timestamps, sinks.logtype_ids, sinks.variables),
            pending_logtypes: PendingEntries::new(),
            pending_variables: PendingEntries::new(),
            staged: SmallVec::new(),
            finished: false,
        }
    }

    /// Returns the column width.
    #[must_use]
    pub fn width(&self) -> EncodingWidth {
        self.columns.width()
    }

    /// Returns the logtype dictionary.
    #[must_use]
    pub fn logtypes(&self) -> &CompressionDictionary {
        &self.logtypes
    }

    /// Returns the variable dictionary.
    #[must_use]
    pub fn variables(&self) -> &CompressionDictionary {
        &self.variables
    }

    fn stage(&mut self, message: &[u8], encoded: &EncodedMessage) -> Result<DictionaryId> {
        self.pending_logtypes.clear();
        self.pending_variables.clear();
        self.staged.clear();

        let logtype = self.logtypes.resolve(encoded.logtype(), &mut self.pending_logtypes)?;
        for variable in encoded.variables() {
            self.staged.push(match *variable {
                EncodedVariable::Integer(value) => StagedValue::Integer(value),
                EncodedVariable::Decimal(value) => StagedValue::Decimal(value),
                EncodedVariable::Dictionary(bounds) => StagedValue::Dictionary(
                    self.variables
                        .resolve(bounds.slice(message), &mut self.pending_variables)?,
                ),
            });
        }

        self.logtypes.ensure_room(&self.pending_logtypes)?;
        self.variables.ensure_room(&self.pending_variables)?;
        self.columns.ensure_room(self.staged.len())?;
        Ok(logtype)
    }
}

impl IrWriter for ColumnarWriter {
    fn write_record(&mut self, timestamp: i64, message: &[u8], encoded: &EncodedMessage) -> Result<()> {
        let logtype = self.stage(message, encoded)?;

        self.logtypes.commit(&mut self.pending_logtypes)?;
        self.variables.commit(&mut self.pending_variables)?;
        self.columns.put_timestamp(timestamp)?;
        self.columns.put_logtype(logtype)?;
        for value in &self.staged {
            match *value {
                StagedValue::Integer(value) => self.columns.put_integer_variable(value)?,
                StagedValue::Decimal(packed) => self.columns.put_decimal_variable(packed)?,
                StagedValue::Dictionary(id) => self.columns.put_dictionary_variable(id)?,
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        first_error([
            self.logtypes.finish(),
            self.variables.finish(),
            self.columns.finish(),
        ])
    }

    fn stats(&self) -> WriterStats {
        let mut streams = vec![
            StreamStats {
                name: files::LOGTYPE_DICTIONARY,
                bytes: self.logtypes.bytes_written(),
            },
            StreamStats {
                name: files::VARIABLE_DICTIONARY,
                bytes: self.variables.bytes_written(),
            },
        ];
        streams.extend(self.columns.stream_stats());
        WriterStats {
            records: self.columns.records(),
            logtypes: self.logtypes.len() as u64,
            dictionary_variables: self.variables.len() as u64,
            streams,
        }
    }
}
