//! Columnar IR decoder.

use byteorder::{BigEndian, ByteOrder};
use logir_common::types::{EncodingWidth, LogRecord, VariableTag};
use logir_common::utils::error::DecodeError;

use crate::dictionary::DecompressionDictionary;
use crate::encoding::variable::{render_decimal, render_integer};

type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Borrowed column streams of a columnar session.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSlices<'a> {
    /// `ts.bin`
    pub timestamps: &'a [u8],
    /// `logtype.bin`
    pub logtype_ids: &'a [u8],
    /// `variable.bin`
    pub variables: &'a [u8],
}

/// Rebuilds records from dictionaries and columns.
///
/// Yields records in write order. After the first error the iterator is
/// exhausted.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    width: EncodingWidth,
    logtypes: &'a DecompressionDictionary,
    variables: &'a DecompressionDictionary,
    columns: ColumnSlices<'a>,
    records: usize,
    next_record: usize,
    value_offset: usize,
    failed: bool,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder, checking that the columns agree on record count.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Corrupt`] if a column is not a whole number of
    /// entries or the timestamp and logtype-id columns disagree.
    pub fn new(
        width: EncodingWidth,
        logtypes: &'a DecompressionDictionary,
        variables: &'a DecompressionDictionary,
        columns: ColumnSlices<'a>,
    ) -> DecodeResult<Self> {
        if columns.timestamps.len() % 8 != 0 {
            return Err(DecodeError::corrupt(format!(
                "timestamp column length {} is not a multiple of 8",
                columns.timestamps.len()
            )));
        }
        let records = columns.timestamps.len() / 8;
        let expected_ids = records * width.logtype_id_bytes();
        if columns.logtype_ids.len() != expected_ids {
            return Err(DecodeError::corrupt(format!(
                "logtype column has {} bytes, expected {expected_ids} for {records} records",
                columns.logtype_ids.len()
            )));
        }
        if columns.variables.len() % width.variable_bytes() != 0 {
            return Err(DecodeError::corrupt(format!(
                "variable column length {} is not a multiple of {}",
                columns.variables.len(),
                width.variable_bytes()
            )));
        }

        Ok(Self {
            width,
            logtypes,
            variables,
            columns,
            records,
            next_record: 0,
            value_offset: 0,
            failed: false,
        })
    }

    /// Returns the total number of records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Decodes the next record's message into `out`, returning its
    /// timestamp.
    ///
    /// `out` is cleared first. Returns `None` once every record has been
    /// decoded.
    pub fn decode_next(&mut self, out: &mut Vec<u8>) -> Option<DecodeResult<i64>> {
        if self.failed {
            return None;
        }
        if self.next_record == self.records {
            if self.value_offset != self.columns.variables.len() {
                self.failed = true;
                return Some(Err(DecodeError::corrupt(format!(
                    "{} trailing bytes in variable column",
                    self.columns.variables.len() - self.value_offset
                ))));
            }
            return None;
        }

        out.clear();
        let result = self.decode_record(out);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    fn decode_record(&mut self, out: &mut Vec<u8>) -> DecodeResult<i64> {
        let index = self.next_record;
        self.next_record += 1;

        let timestamp = BigEndian::read_i64(&self.columns.timestamps[index * 8..]);
        let logtype_id = match self.width {
            EncodingWidth::Compact => u64::from(BigEndian::read_u16(&self.columns.logtype_ids[index * 2..])),
            EncodingWidth::Standard => u64::from(BigEndian::read_u32(&self.columns.logtype_ids[index * 4..])),
        };
        let logtype = self.logtypes.get(logtype_id)?;

        for &byte in logtype {
            match VariableTag::from_byte(byte) {
                None => out.push(byte),
                Some(VariableTag::Integer) => render_integer(self.next_value()?, out),
                Some(VariableTag::Decimal) => render_decimal(self.next_value()?, self.width, out)?,
                Some(VariableTag::Dictionary) => {
                    let value = self.next_value()?;
                    let id = u64::try_from(value).map_err(|_| {
                        DecodeError::corrupt(format!("negative dictionary id {value} in record {index}"))
                    })?;
                    out.extend_from_slice(self.variables.get(id)?);
                }
            }
        }
        Ok(timestamp)
    }

    fn next_value(&mut self) -> DecodeResult<i64> {
        let size = self.width.variable_bytes();
        let rest = &self.columns.variables[self.value_offset..];
        if rest.len() < size {
            return Err(DecodeError::corrupt(format!(
                "variable column exhausted in record {}",
                self.next_record - 1
            )));
        }
        self.value_offset += size;
        Ok(match self.width {
            EncodingWidth::Compact => i64::from(BigEndian::read_i32(rest)),
            EncodingWidth::Standard => BigEndian::read_i64(rest),
        })
    }
}

impl Iterator for Decoder<'_> {
    type Item = DecodeResult<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut message = Vec::new();
        self.decode_next(&mut message)
            .map(|result| result.map(|timestamp| LogRecord::new(timestamp, message)))
    }
}
