//! Reading dictionaries back, and digest-addressed rebuilding.

use std::ops::Range;

use byteorder::{BigEndian, ByteOrder};
use logir_common::types::{DictionaryId, DictionaryKind};
use logir_common::utils::error::{DecodeError, Error, Result};

use super::ENTRY_HEADER_LEN;
use super::index::{Digest, DigestIndex};
use crate::storage::ByteSink;

/// ID-ordered dictionary entries parsed from a persisted dictionary stream.
#[derive(Debug, Clone)]
pub struct DecompressionDictionary {
    kind: DictionaryKind,
    data: Vec<u8>,
    entries: Vec<Range<usize>>,
}

impl DecompressionDictionary {
    /// Parses a stream of `u16 BE length, bytes` entries.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Corrupt`] if the stream ends inside a length
    /// prefix or an entry.
    pub fn parse(kind: DictionaryKind, bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            if bytes.len() - pos < ENTRY_HEADER_LEN {
                return Err(DecodeError::corrupt(format!(
                    "{kind} dictionary truncated in length prefix of entry {}",
                    entries.len()
                )));
            }
            let len = usize::from(BigEndian::read_u16(&bytes[pos..]));
            let begin = pos + ENTRY_HEADER_LEN;
            let end = begin + len;
            if end > bytes.len() {
                return Err(DecodeError::corrupt(format!(
                    "{kind} dictionary entry {} needs {len} bytes, {} remain",
                    entries.len(),
                    bytes.len() - begin
                )));
            }
            entries.push(begin..end);
            pos = end;
        }

        Ok(Self {
            kind,
            data: bytes.to_vec(),
            entries,
        })
    }

    /// Returns which namespace this dictionary holds.
    #[must_use]
    pub fn kind(&self) -> DictionaryKind {
        self.kind
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the dictionary has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the bytes of entry `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnassignedId`] if no entry has that ID.
    pub fn get(&self, id: u64) -> std::result::Result<&[u8], DecodeError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.entries.get(index))
            .map(|range| &self.data[range.clone()])
            .ok_or(DecodeError::UnassignedId {
                dictionary: self.kind,
                id,
                len: self.entries.len(),
            })
    }

    /// Iterates over entries in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|range| &self.data[range.clone()])
    }
}

/// Dictionary rebuilt from digest-addressed references.
///
/// Used when re-encoding a combined stream into columns: content arrives
/// once with its digest, and later records refer to it by digest alone.
/// The transmitted digest is trusted and never recomputed.
pub struct DigestDictionary {
    kind: DictionaryKind,
    index: DigestIndex,
    next_id: u64,
    max_id: u32,
    sink: Box<dyn ByteSink>,
}

impl std::fmt::Debug for DigestDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestDictionary")
            .field("kind", &self.kind)
            .field("len", &self.next_id)
            .field("max_id", &self.max_id)
            .finish_non_exhaustive()
    }
}

impl DigestDictionary {
    /// Creates an empty dictionary persisting to `sink`.
    #[must_use]
    pub fn new(kind: DictionaryKind, max_id: u32, sink: Box<dyn ByteSink>) -> Self {
        Self {
            kind,
            index: DigestIndex::default(),
            next_id: 0,
            max_id,
            sink,
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next_id as usize
    }

    /// Returns whether the dictionary has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_id == 0
    }

    /// Returns the bytes persisted so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.sink.written()
    }

    /// Resolves a seen-before reference.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownReference`] if the digest's content was
    /// never transmitted.
    pub fn existing_id(&self, key: &Digest) -> std::result::Result<DictionaryId, DecodeError> {
        self.index
            .get_digest(key)
            .ok_or(DecodeError::UnknownReference {
                dictionary: self.kind,
            })
    }

    /// Returns the ID for `key`, persisting `entry` if the digest is new.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryTooLong`], [`Error::DictionaryOverflow`], or the
    /// sink's error.
    pub fn upsert(&mut self, key: Digest, entry: &[u8]) -> Result<DictionaryId> {
        if let Some(id) = self.index.get_digest(&key) {
            return Ok(id);
        }
        let Ok(len) = u16::try_from(entry.len()) else {
            return Err(Error::EntryTooLong {
                dictionary: self.kind,
                len: entry.len(),
            });
        };
        if self.next_id > u64::from(self.max_id) {
            return Err(Error::DictionaryOverflow {
                dictionary: self.kind,
                id: self.next_id,
                max: u64::from(self.max_id),
            });
        }

        let mut header = [0u8; ENTRY_HEADER_LEN];
        BigEndian::write_u16(&mut header, len);
        self.sink.put(&header)?;
        self.sink.put(entry)?;

        let id = DictionaryId::new(self.next_id as u32);
        self.index.insert_digest(key, id);
        self.next_id += 1;
        Ok(id)
    }

    /// Finishes the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        self.sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::index::digest;
    use crate::storage::MemorySink;

    #[test]
    fn test_parse_entries() {
        let dict =
            DecompressionDictionary::parse(DictionaryKind::Variable, b"\x00\x04/a/b\x00\x00\x00\x02ff")
                .unwrap();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.get(0).unwrap(), b"/a/b");
        assert_eq!(dict.get(1).unwrap(), b"");
        assert_eq!(dict.get(2).unwrap(), b"ff");
        assert_eq!(dict.iter().count(), 3);
    }

    #[test]
    fn test_unassigned_vs_corrupt() {
        let dict = DecompressionDictionary::parse(DictionaryKind::Logtype, b"\x00\x01a").unwrap();
        assert_eq!(
            dict.get(1),
            Err(DecodeError::UnassignedId {
                dictionary: DictionaryKind::Logtype,
                id: 1,
                len: 1
            })
        );

        let truncated = DecompressionDictionary::parse(DictionaryKind::Logtype, b"\x00\x05abc");
        assert!(matches!(truncated, Err(DecodeError::Corrupt(_))));
        let half_header = DecompressionDictionary::parse(DictionaryKind::Logtype, b"\x00\x01a\x00");
        assert!(matches!(half_header, Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn test_empty_stream() {
        let dict = DecompressionDictionary::parse(DictionaryKind::Variable, b"").unwrap();
        assert!(dict.is_empty());
        assert!(dict.get(0).is_err());
    }

    #[test]
    fn test_digest_dictionary() {
        let sink = MemorySink::new();
        let mut dict = DigestDictionary::new(DictionaryKind::Logtype, u32::MAX, Box::new(sink.clone()));
        let key = digest(b"hello \x11");

        assert_eq!(
            dict.existing_id(&key),
            Err(DecodeError::UnknownReference {
                dictionary: DictionaryKind::Logtype
            })
        );
        assert_eq!(dict.upsert(key, b"hello \x11").unwrap(), DictionaryId::new(0));
        assert_eq!(dict.existing_id(&key).unwrap(), DictionaryId::new(0));
        assert_eq!(dict.upsert(key, b"hello \x11").unwrap(), DictionaryId::new(0));
        assert_eq!(dict.len(), 1);
        assert_eq!(sink.contents(), b"\x00\x07hello \x11");
    }
}
