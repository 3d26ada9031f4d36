//! Combined-stream IR.
//!
//! Everything goes to one sink as `opcode [payload]` frames. The high nibble
//! of the opcode is the frame kind:
//!
//! | Opcode | Payload |
//! |--------|---------|
//! | `0x10` | timestamp, i64 BE |
//! | `0x2c` | logtype reference |
//! | `0x3c` | dictionary variable reference |
//! | `0x40` | numeric variable value, i64 BE (standard) |
//! | `0x50` | numeric variable value, i32 BE (compact) |
//! | `0x00` | end of stream |
//!
//! For references the low nibble `c` is the length class:
//!
//! | Class | Payload |
//! |-------|---------|
//! | `0` | 32-byte SHA-256 digest of content sent earlier |
//! | `1` | digest, u8 length, content |
//! | `2` | digest, u16 BE length, content |
//! | `3` | digest, u32 BE length, content |
//!
//! Content is sent with the first reference to it only; consumers keep their
//! own digest-keyed dictionaries to resolve later references. The writer
//! refuses content those dictionaries could not hold, so every accepted
//! record stays readable.

use bytes::{Buf, BufMut, BytesMut};
use logir_common::types::{DictionaryKind, EncodingWidth};
use logir_common::utils::error::{DecodeError, Error, Result};
use smallvec::SmallVec;

use super::{IrWriter, StreamStats, WriterStats, compact_value, ensure_capacity, files};
use crate::dictionary::index::{Digest, SeenDigests, digest};
use crate::encoding::{EncodedMessage, EncodedVariable};
use crate::storage::ByteSink;

/// Opcode bytes.
pub mod opcode {
    /// End of stream.
    pub const END: u8 = 0x00;
    /// Record timestamp.
    pub const TIMESTAMP: u8 = 0x10;
    /// Logtype reference; low nibble is the length class.
    pub const LOGTYPE: u8 = 0x20;
    /// Dictionary variable reference; low nibble is the length class.
    pub const DICTIONARY_VARIABLE: u8 = 0x30;
    /// Numeric variable value, 64 bit.
    pub const NUMERIC_I64: u8 = 0x40;
    /// Numeric variable value, 32 bit.
    pub const NUMERIC_I32: u8 = 0x50;

    /// Reference to content sent earlier.
    pub const SEEN_BEFORE: u8 = 0x0;
    /// Content with a u8 length.
    pub const LEN_U8: u8 = 0x1;
    /// Content with a u16 length.
    pub const LEN_U16: u8 = 0x2;
    /// Content with a u32 length.
    pub const LEN_U32: u8 = 0x3;
}

const DIGEST_LEN: usize = 32;

/// Writes records as a single combined stream.
pub struct StreamWriter {
    width: EncodingWidth,
    sink: Box<dyn ByteSink>,
    seen_logtypes: SeenDigests,
    seen_variables: SeenDigests,
    frame: BytesMut,
    new_logtype: Option<Digest>,
    new_variables: SmallVec<[Digest; 4]>,
    records: u64,
    finished: bool,
}

impl std::fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("width", &self.width)
            .field("records", &self.records)
            .field("logtypes", &self.seen_logtypes.len())
            .field("variables", &self.seen_variables.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl StreamWriter {
    /// Creates a writer appending to `sink`.
    #[must_use]
    pub fn new(width: EncodingWidth, sink: Box<dyn ByteSink>) -> Self {
        Self {
            width,
            sink,
            seen_logtypes: SeenDigests::default(),
            seen_variables: SeenDigests::default(),
            frame: BytesMut::with_capacity(256),
            new_logtype: None,
            new_variables: SmallVec::new(),
            records: 0,
            finished: false,
        }
    }

    /// Returns the value width.
    #[must_use]
    pub fn width(&self) -> EncodingWidth {
        self.width
    }

    fn put_value(&mut self, value: i64) -> Result<()> {
        match self.width {
            EncodingWidth::Compact => {
                self.frame.put_u8(opcode::NUMERIC_I32);
                self.frame.put_i32(compact_value(value)?);
            }
            EncodingWidth::Standard => {
                self.frame.put_u8(opcode::NUMERIC_I64);
                self.frame.put_i64(value);
            }
        }
        Ok(())
    }
}

/// Fails if a new entry with id `id` would not fit a `u16`-prefixed
/// dictionary capped at `max`.
fn check_new_entry(kind: DictionaryKind, entry: &[u8], id: usize, max: u32) -> Result<()> {
    if entry.len() > usize::from(u16::MAX) {
        return Err(Error::EntryTooLong {
            dictionary: kind,
            len: entry.len(),
        });
    }
    if id as u64 > u64::from(max) {
        return Err(Error::DictionaryOverflow {
            dictionary: kind,
            id: id as u64,
            max: u64::from(max),
        });
    }
    Ok(())
}

/// Appends a reference frame, with content if `seen_before` is false.
fn put_reference(frame: &mut BytesMut, kind: u8, key: &Digest, content: &[u8], seen_before: bool) {
    if seen_before {
        frame.put_u8(kind | opcode::SEEN_BEFORE);
        frame.put_slice(key);
        return;
    }
    if let Ok(len) = u8::try_from(content.len()) {
        frame.put_u8(kind | opcode::LEN_U8);
        frame.put_slice(key);
        frame.put_u8(len);
    } else if let Ok(len) = u16::try_from(content.len()) {
        frame.put_u8(kind | opcode::LEN_U16);
        frame.put_slice(key);
        frame.put_u16(len);
    } else {
        frame.put_u8(kind | opcode::LEN_U32);
        frame.put_slice(key);
        frame.put_u32(content.len() as u32);
    }
    frame.put_slice(content);
}

impl IrWriter for StreamWriter {
    fn write_record(&mut self, timestamp: i64, message: &[u8], encoded: &EncodedMessage) -> Result<()> {
        self.frame.clear();
        self.new_logtype = None;
        self.new_variables.clear();

        self.frame.put_u8(opcode::TIMESTAMP);
        self.frame.put_i64(timestamp);

        let logtype_key = digest(encoded.logtype());
        let seen = self.seen_logtypes.contains(&logtype_key);
        if !seen {
            check_new_entry(
                DictionaryKind::Logtype,
                encoded.logtype(),
                self.seen_logtypes.len(),
                self.width.max_logtype_id(),
            )?;
        }
        put_reference(&mut self.frame, opcode::LOGTYPE, &logtype_key, encoded.logtype(), seen);
        if !seen {
            self.new_logtype = Some(logtype_key);
        }

        for variable in encoded.variables() {
            match *variable {
                EncodedVariable::Integer(value) | EncodedVariable::Decimal(value) => {
                    self.put_value(value)?;
                }
                EncodedVariable::Dictionary(bounds) => {
                    let token = bounds.slice(message);
                    let key = digest(token);
                    let seen = self.seen_variables.contains(&key) || self.new_variables.contains(&key);
                    if !seen {
                        check_new_entry(
                            DictionaryKind::Variable,
                            token,
                            self.seen_variables.len() + self.new_variables.len(),
                            self.width.max_variable_id(),
                        )?;
                    }
                    put_reference(&mut self.frame, opcode::DICTIONARY_VARIABLE, &key, token, seen);
                    if !seen {
                        self.new_variables.push(key);
                    }
                }
            }
        }

        // Leave room for the end marker
        ensure_capacity(files::COMBINED, self.sink.as_ref(), self.frame.len() as u64 + 1)?;
        self.sink.put(&self.frame)?;

        if let Some(key) = self.new_logtype.take() {
            self.seen_logtypes.insert(key);
        }
        for key in self.new_variables.drain(..) {
            self.seen_variables.insert(key);
        }
        self.records += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let terminated = self.sink.put(&[opcode::END]);
        let finished = self.sink.finish();
        terminated.and(finished)
    }

    fn stats(&self) -> WriterStats {
        WriterStats {
            records: self.records,
            logtypes: self.seen_logtypes.len() as u64,
            dictionary_variables: self.seen_variables.len() as u64,
            streams: vec![StreamStats {
                name: files::COMBINED,
                bytes: self.sink.written(),
            }],
        }
    }
}

/// A dictionary reference read from a combined stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    /// SHA-256 digest of the content.
    pub digest: Digest,
    /// The content, present the first time it is referenced.
    pub content: Option<&'a [u8]>,
}

/// One frame of a combined stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent<'a> {
    /// Start of a record.
    Timestamp(i64),
    /// The record's logtype.
    Logtype(Reference<'a>),
    /// A dictionary variable.
    DictionaryVariable(Reference<'a>),
    /// An integer or packed decimal value of the given width.
    Numeric {
        /// The value, sign-extended.
        value: i64,
        /// Width implied by the opcode.
        width: EncodingWidth,
    },
}

impl StreamEvent<'_> {
    /// Returns which dictionary a reference event belongs to.
    #[must_use]
    pub fn dictionary(&self) -> Option<DictionaryKind> {
        match self {
            Self::Logtype(_) => Some(DictionaryKind::Logtype),
            Self::DictionaryVariable(_) => Some(DictionaryKind::Variable),
            _ => None,
        }
    }
}

/// Iterates over the frames of a combined stream.
///
/// Stops after the end marker. A stream that ends cleanly between frames
/// without an end marker (a writer that never closed) is accepted with a
/// warning; bytes after the end marker are an error.
#[derive(Debug, Clone)]
pub struct StreamReader<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> StreamReader<'a> {
    /// Creates a reader over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            done: false,
        }
    }

    fn take(&mut self, len: usize, what: &str) -> std::result::Result<&'a [u8], DecodeError> {
        let rest = &self.data[self.offset..];
        if rest.len() < len {
            return Err(DecodeError::corrupt(format!(
                "stream truncated in {what} at offset {}: need {len} bytes, {} remain",
                self.offset,
                rest.len()
            )));
        }
        self.offset += len;
        Ok(&rest[..len])
    }

    fn read_reference(&mut self, class: u8) -> std::result::Result<Reference<'a>, DecodeError> {
        let mut key = [0u8; DIGEST_LEN];
        key.copy_from_slice(self.take(DIGEST_LEN, "digest")?);

        let len = match class {
            opcode::SEEN_BEFORE => {
                return Ok(Reference {
                    digest: key,
                    content: None,
                });
            }
            opcode::LEN_U8 => usize::from(self.take(1, "length")?.get_u8()),
            opcode::LEN_U16 => usize::from(self.take(2, "length")?.get_u16()),
            opcode::LEN_U32 => self.take(4, "length")?.get_u32() as usize,
            other => {
                return Err(DecodeError::corrupt(format!(
                    "unknown length class {other:#x} at offset {}",
                    self.offset
                )));
            }
        };
        Ok(Reference {
            digest: key,
            content: Some(self.take(len, "content")?),
        })
    }

    fn read_event(&mut self) -> std::result::Result<Option<StreamEvent<'a>>, DecodeError> {
        if self.offset == self.data.len() {
            tracing::warn!(offset = self.offset, "combined stream has no end marker");
            return Ok(None);
        }
        let op = self.take(1, "opcode")?[0];
        let event = match op & 0xF0 {
            opcode::END if op == opcode::END => {
                if self.offset != self.data.len() {
                    return Err(DecodeError::corrupt(format!(
                        "{} bytes after end marker",
                        self.data.len() - self.offset
                    )));
                }
                return Ok(None);
            }
            opcode::TIMESTAMP if op == opcode::TIMESTAMP => {
                StreamEvent::Timestamp(self.take(8, "timestamp")?.get_i64())
            }
            opcode::LOGTYPE => StreamEvent::Logtype(self.read_reference(op & 0x0F)?),
            opcode::DICTIONARY_VARIABLE => {
                StreamEvent::DictionaryVariable(self.read_reference(op & 0x0F)?)
            }
            opcode::NUMERIC_I64 if op == opcode::NUMERIC_I64 => StreamEvent::Numeric {
                value: self.take(8, "value")?.get_i64(),
                width: EncodingWidth::Standard,
            },
            opcode::NUMERIC_I32 if op == opcode::NUMERIC_I32 => StreamEvent::Numeric {
                value: i64::from(self.take(4, "value")?.get_i32()),
                width: EncodingWidth::Compact,
            },
            _ => {
                return Err(DecodeError::corrupt(format!(
                    "unknown opcode {op:#04x} at offset {}",
                    self.offset - 1
                )));
            }
        };
        Ok(Some(event))
    }
}

impl<'a> Iterator for StreamReader<'a> {
    type Item = std::result::Result<StreamEvent<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
