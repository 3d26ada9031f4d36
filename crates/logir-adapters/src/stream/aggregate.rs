//! Combined stream to columnar session.

use logir_common::types::{DictionaryId, DictionaryKind, EncodingWidth, LogRecord, VariableTag};
use logir_common::utils::error::{DecodeError, Error, Result};
use logir_core::dictionary::DigestDictionary;
use logir_core::ir::decoder::ColumnSlices;
use logir_core::ir::stream::Reference;
use logir_core::ir::{ColumnarSinks, Columns, Decoder, StreamEvent, StreamReader, StreamStats, WriterStats, files};
use logir_core::storage::MemorySink;
use logir_core::DecompressionDictionary;
use smallvec::SmallVec;

/// A record whose frames have been read but not yet written.
#[derive(Debug)]
struct OpenRecord {
    timestamp: i64,
    logtype: Option<DictionaryId>,
    values: SmallVec<[i64; 8]>,
}

/// Replays combined streams into a columnar session.
///
/// Records are buffered until their last frame has been read, so a stream
/// that is corrupt mid-record never leaves a partial record in the columns.
pub struct StreamAggregator {
    width: EncodingWidth,
    logtypes: DigestDictionary,
    variables: DigestDictionary,
    columns: Columns,
    /// Variable tags of each logtype, indexed by logtype ID.
    tags: Vec<Box<[VariableTag]>>,
    record: Option<OpenRecord>,
    finished: bool,
}

impl std::fmt::Debug for StreamAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAggregator")
            .field("width", &self.width)
            .field("logtypes", &self.logtypes)
            .field("variables", &self.variables)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl StreamAggregator {
    /// Creates an aggregator writing to `sinks`.
    #[must_use]
    pub fn new(width: EncodingWidth, sinks: ColumnarSinks) -> Self {
        Self {
            width,
            logtypes: DigestDictionary::new(
                DictionaryKind::Logtype,
                width.max_logtype_id(),
                sinks.logtype_dictionary,
            ),
            variables: DigestDictionary::new(
                DictionaryKind::Variable,
                width.max_variable_id(),
                sinks.variable_dictionary,
            ),
            columns: Columns::new(width, sinks.timestamps, sinks.logtype_ids, sinks.variables),
            tags: Vec::new(),
            record: None,
            finished: false,
        }
    }

    /// Replays every frame of `stream`, returning the number of records
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for a malformed stream, or any error from
    /// the dictionaries or sinks.
    pub fn feed(&mut self, stream: &[u8]) -> Result<u64> {
        let before = self.columns.records();
        for event in StreamReader::new(stream) {
            match event? {
                StreamEvent::Timestamp(timestamp) => {
                    self.flush_record()?;
                    self.record = Some(OpenRecord {
                        timestamp,
                        logtype: None,
                        values: SmallVec::new(),
                    });
                }
                StreamEvent::Logtype(reference) => self.on_logtype(reference)?,
                StreamEvent::DictionaryVariable(reference) => {
                    self.expect_tag(VariableTag::Dictionary)?;
                    let id = resolve(&mut self.variables, reference)?;
                    self.open_record()?.values.push(i64::from(id.as_u32()));
                }
                StreamEvent::Numeric { value, width } => {
                    if width != self.width {
                        return Err(DecodeError::corrupt(format!(
                            "{} value in a {} stream",
                            width.name(),
                            self.width.name()
                        ))
                        .into());
                    }
                    let tag = self.next_tag()?;
                    if tag == VariableTag::Dictionary {
                        return Err(DecodeError::corrupt("numeric value where a dictionary variable was expected").into());
                    }
                    self.open_record()?.values.push(value);
                }
            }
        }
        self.flush_record()?;
        Ok(self.columns.records() - before)
    }

    /// Finishes every sink and returns the session counters.
    ///
    /// # Errors
    ///
    /// Returns the first sink error; every sink is still finished.
    pub fn finish(&mut self) -> Result<WriterStats> {
        if !self.finished {
            self.finished = true;
            let results = [self.logtypes.finish(), self.variables.finish(), self.columns.finish()];
            for result in results {
                result?;
            }
        }
        Ok(self.stats())
    }

    /// Returns the counters of the session written so far.
    #[must_use]
    pub fn stats(&self) -> WriterStats {
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

    fn on_logtype(&mut self, reference: Reference<'_>) -> Result<()> {
        if self.open_record()?.logtype.is_some() {
            return Err(DecodeError::corrupt("second logtype in one record").into());
        }
        let id = resolve(&mut self.logtypes, reference)?;
        if id.index() == self.tags.len() {
            // First sight always carries content
            let content = reference.content.unwrap_or_default();
            self.tags.push(content.iter().filter_map(|&b| VariableTag::from_byte(b)).collect());
        }
        self.open_record()?.logtype = Some(id);
        Ok(())
    }

    fn open_record(&mut self) -> Result<&mut OpenRecord> {
        self.record
            .as_mut()
            .ok_or_else(|| DecodeError::corrupt("frame outside of a record").into())
    }

    fn next_tag(&mut self) -> Result<VariableTag> {
        let record = self.open_record()?;
        let logtype = record
            .logtype
            .ok_or_else(|| DecodeError::corrupt("variable before logtype"))?;
        let position = record.values.len();
        self.tags[logtype.index()]
            .get(position)
            .copied()
            .ok_or_else(|| DecodeError::corrupt("more variables than the logtype has tags").into())
    }

    fn expect_tag(&mut self, expected: VariableTag) -> Result<()> {
        let tag = self.next_tag()?;
        if tag != expected {
            return Err(DecodeError::corrupt(format!(
                "expected {expected:?} variable, logtype has {tag:?}"
            ))
            .into());
        }
        Ok(())
    }

    fn flush_record(&mut self) -> Result<()> {
        let Some(record) = self.record.take() else {
            return Ok(());
        };
        let logtype = record
            .logtype
            .ok_or_else(|| DecodeError::corrupt(format!("record at {} has no logtype", record.timestamp)))?;
        let tags = &self.tags[logtype.index()];
        if tags.len() != record.values.len() {
            return Err(DecodeError::corrupt(format!(
                "record at {} has {} variables, logtype expects {}",
                record.timestamp,
                record.values.len(),
                tags.len()
            ))
            .into());
        }

        self.columns.put_timestamp(record.timestamp)?;
        self.columns.put_logtype(logtype)?;
        for (&tag, &value) in tags.iter().zip(&record.values) {
            match tag {
                VariableTag::Integer => self.columns.put_integer_variable(value)?,
                VariableTag::Decimal => self.columns.put_decimal_variable(value)?,
                VariableTag::Dictionary => self.columns.put_dictionary_variable(DictionaryId::new(value as u32))?,
            }
        }
        Ok(())
    }
}

fn resolve(dictionary: &mut DigestDictionary, reference: Reference<'_>) -> Result<DictionaryId> {
    match reference.content {
        Some(content) => dictionary.upsert(reference.digest, content),
        None => Ok(dictionary.existing_id(&reference.digest)?),
    }
}

/// Owned streams of a columnar session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnarImage {
    /// `logtype.dict`
    pub logtype_dictionary: Vec<u8>,
    /// `variable.dict`
    pub variable_dictionary: Vec<u8>,
    /// `ts.bin`
    pub timestamps: Vec<u8>,
    /// `logtype.bin`
    pub logtype_ids: Vec<u8>,
    /// `variable.bin`
    pub variables: Vec<u8>,
}

impl ColumnarImage {
    /// Borrows the three columns.
    #[must_use]
    pub fn columns(&self) -> ColumnSlices<'_> {
        ColumnSlices {
            timestamps: &self.timestamps,
            logtype_ids: &self.logtype_ids,
            variables: &self.variables,
        }
    }

    /// Parses both dictionaries.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Corrupt`] if a dictionary is truncated.
    pub fn dictionaries(&self) -> Result<(DecompressionDictionary, DecompressionDictionary)> {
        Ok((
            DecompressionDictionary::parse(DictionaryKind::Logtype, &self.logtype_dictionary)?,
            DecompressionDictionary::parse(DictionaryKind::Variable, &self.variable_dictionary)?,
        ))
    }
}

/// Replays a combined stream into an in-memory columnar session.
///
/// # Errors
///
/// Returns [`Error::Decode`] for a malformed stream or a width mismatch.
pub fn aggregate_stream(width: EncodingWidth, stream: &[u8]) -> Result<ColumnarImage> {
    let handles: [MemorySink; 5] = Default::default();
    let mut aggregator = StreamAggregator::new(
        width,
        ColumnarSinks {
            logtype_dictionary: Box::new(handles[0].clone()),
            variable_dictionary: Box::new(handles[1].clone()),
            timestamps: Box::new(handles[2].clone()),
            logtype_ids: Box::new(handles[3].clone()),
            variables: Box::new(handles[4].clone()),
        },
    );
    aggregator.feed(stream)?;
    aggregator.finish()?;

    let [logtype_dictionary, variable_dictionary, timestamps, logtype_ids, variables] =
        handles.map(|sink| sink.contents());
    Ok(ColumnarImage {
        logtype_dictionary,
        variable_dictionary,
        timestamps,
        logtype_ids,
        variables,
    })
}

/// Decodes a combined stream straight to records.
///
/// # Errors
///
/// Returns [`Error::Decode`] for a malformed stream or a width mismatch.
pub fn decode_stream(width: EncodingWidth, stream: &[u8]) -> Result<Vec<LogRecord>> {
    let image = aggregate_stream(width, stream)?;
    let (logtypes, variables) = image.dictionaries()?;
    let decoder = Decoder::new(width, &logtypes, &variables, image.columns())?;
    decoder.map(|record| record.map_err(Error::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logir_core::encoding::MessageEncoder;
    use logir_core::ir::{IrWriter, StreamWriter};

    fn combined(width: EncodingWidth, records: &[(i64, &str)], close: bool) -> Vec<u8> {
        let sink = MemorySink::new();
        let encoder = MessageEncoder::new(width);
        let mut writer = StreamWriter::new(width, Box::new(sink.clone()));
        for &(timestamp, message) in records {
            let encoded = encoder.encode(message.as_bytes());
            writer.write_record(timestamp, message.as_bytes(), &encoded).unwrap();
        }
        if close {
            writer.finish().unwrap();
        }
        sink.contents()
    }

    const RECORDS: &[(i64, &str)] = &[
        (10, "user=42 path=/a/b id=ff"),
        (11, "user=43 path=/a/b id=fe"),
        (12, "load 0.75 on disk7"),
        (13, ""),
        (14, "load -1.5 on disk7"),
    ];

    fn expected() -> Vec<LogRecord> {
        RECORDS
            .iter()
            .map(|&(ts, m)| LogRecord::new(ts, m.as_bytes()))
            .collect()
    }

    #[test]
    fn test_decode_stream_round_trip() {
        for width in [EncodingWidth::Compact, EncodingWidth::Standard] {
            let bytes = combined(width, RECORDS, true);
            assert_eq!(decode_stream(width, &bytes).unwrap(), expected());
        }
    }

    #[test]
    fn test_unterminated_stream() {
        let bytes = combined(EncodingWidth::Standard, RECORDS, false);
        assert_eq!(decode_stream(EncodingWidth::Standard, &bytes).unwrap(), expected());
    }

    #[test]
    fn test_aggregated_dictionaries() {
        let bytes = combined(EncodingWidth::Compact, RECORDS, true);
        let handles: [MemorySink; 5] = Default::default();
        let mut aggregator = StreamAggregator::new(
            EncodingWidth::Compact,
            ColumnarSinks {
                logtype_dictionary: Box::new(handles[0].clone()),
                variable_dictionary: Box::new(handles[1].clone()),
                timestamps: Box::new(handles[2].clone()),
                logtype_ids: Box::new(handles[3].clone()),
                variables: Box::new(handles[4].clone()),
            },
        );
        assert_eq!(aggregator.feed(&bytes).unwrap(), 5);
        let stats = aggregator.finish().unwrap();

        assert_eq!(stats.records, 5);
        assert_eq!(stats.logtypes, 3);
        // "/a/b", "ff", "fe", "disk7"
        assert_eq!(stats.dictionary_variables, 4);
        assert_eq!(
            handles[3].contents(),
            [0u16, 0, 1, 2, 1].iter().flat_map(|id| id.to_be_bytes()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_width_mismatch() {
        let bytes = combined(EncodingWidth::Standard, &[(1, "n 5")], true);
        let err = decode_stream(EncodingWidth::Compact, &bytes).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Corrupt(_))));
    }

    #[test]
    fn test_unknown_reference() {
        // Second record alone refers to content never transmitted
        let bytes = combined(EncodingWidth::Standard, &[(1, "same"), (2, "same")], true);
        let first_record_len = 1 + 8 + 1 + 32 + 1 + 4;
        let err = decode_stream(EncodingWidth::Standard, &bytes[first_record_len..]).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::UnknownReference {
                dictionary: DictionaryKind::Logtype
            })
        ));
    }

    #[test]
    fn test_frame_outside_record() {
        let bytes = combined(EncodingWidth::Standard, &[(1, "n 5")], true);
        // Skip the timestamp frame
        let err = decode_stream(EncodingWidth::Standard, &bytes[9..]).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Corrupt(_))));
    }

    #[test]
    fn test_empty_stream() {
        assert!(decode_stream(EncodingWidth::Compact, &[0x00]).unwrap().is_empty());
        assert!(decode_stream(EncodingWidth::Compact, &[]).unwrap().is_empty());
    }
}
