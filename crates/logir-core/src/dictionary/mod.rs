//! Logtype and variable dictionaries.
//!
//! A [`CompressionDictionary`] assigns dense IDs in first-sight order and
//! persists each new entry exactly once as a big-endian `u16` length
//! followed by the raw bytes. [`DecompressionDictionary`] reads that
//! encoding back.
//!
//! Insertion is two-phase so a record either lands completely or not at
//! all:
//!
//! ```text
//! resolve(bytes, &mut pending)  -> id      (no mutation)
//! ... width and capacity checks for the whole record ...
//! commit(&mut pending)                     (persist + index)
//! ```

mod decompression;
pub mod index;

pub use decompression::{DecompressionDictionary, DigestDictionary};
pub use index::{DigestIndex, DirectIndex, KeyIndex};

use byteorder::{BigEndian, ByteOrder};
use logir_common::types::{DictionaryId, DictionaryKind, KeyMode};
use logir_common::utils::error::{Error, Result};
use smallvec::SmallVec;

use crate::storage::ByteSink;

/// Size of the length prefix of a persisted entry.
pub const ENTRY_HEADER_LEN: usize = 2;

/// Dictionary entries resolved for a record but not yet committed.
///
/// Entries keep the order in which they were first resolved, which is also
/// their ID order.
#[derive(Debug, Default, Clone)]
pub struct PendingEntries {
    bytes: Vec<u8>,
    spans: SmallVec<[(usize, usize); 4]>,
}

impl PendingEntries {
    /// Creates an empty staging list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of staged entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Iterates over staged entries in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.spans.iter().map(|&(begin, end)| &self.bytes[begin..end])
    }

    /// Returns the bytes the staged entries occupy once persisted.
    #[must_use]
    pub fn persisted_len(&self) -> u64 {
        (self.bytes.len() + self.spans.len() * ENTRY_HEADER_LEN) as u64
    }

    /// Drops all staged entries.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.spans.clear();
    }

    fn position(&self, entry: &[u8]) -> Option<usize> {
        self.iter().position(|staged| staged == entry)
    }

    fn push(&mut self, entry: &[u8]) {
        let begin = self.bytes.len();
        self.bytes.extend_from_slice(entry);
        self.spans.push((begin, self.bytes.len()));
    }
}

/// Compression-side dictionary for one namespace.
pub struct CompressionDictionary {
    kind: DictionaryKind,
    index: Box<dyn KeyIndex>,
    next_id: u64,
    max_id: u32,
    sink: Box<dyn ByteSink>,
}

impl std::fmt::Debug for CompressionDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionDictionary")
            .field("kind", &self.kind)
            .field("mode", &self.index.mode())
            .field("len", &self.next_id)
            .field("max_id", &self.max_id)
            .field("bytes_written", &self.sink.written())
            .finish()
    }
}

impl CompressionDictionary {
    /// Creates an empty dictionary persisting to `sink`.
    ///
    /// `max_id` is the largest ID the column referencing this dictionary
    /// can hold.
    #[must_use]
    pub fn new(
        kind: DictionaryKind,
        mode: KeyMode,
        max_id: u32,
        sink: Box<dyn ByteSink>,
    ) -> Self {
        Self {
            kind,
            index: index::new_index(mode),
            next_id: 0,
            max_id,
            sink,
        }
    }

    /// Returns which namespace this dictionary holds.
    #[must_use]
    pub fn kind(&self) -> DictionaryKind {
        self.kind
    }

    /// Returns the number of committed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns whether no entry has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the bytes persisted so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.sink.written()
    }

    /// Returns the sink's remaining capacity, if bounded.
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.sink.remaining()
    }

    /// Looks up a committed entry without staging anything.
    #[must_use]
    pub fn get(&self, entry: &[u8]) -> Option<DictionaryId> {
        self.index.get(entry)
    }

    /// Returns the ID `entry` has or will have, staging it if new.
    ///
    /// Nothing is persisted or indexed until [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryTooLong`] if `entry` exceeds the `u16` length
    /// prefix, or [`Error::DictionaryOverflow`] if the new ID would not fit
    /// the column. `pending` is left unchanged on error.
    pub fn resolve(&self, entry: &[u8], pending: &mut PendingEntries) -> Result<DictionaryId> {
        if let Some(id) = self.index.get(entry) {
            return Ok(id);
        }
        let id = match pending.position(entry) {
            Some(position) => self.next_id + position as u64,
            None => {
                if entry.len() > usize::from(u16::MAX) {
                    return Err(Error::EntryTooLong {
                        dictionary: self.kind,
                        len: entry.len(),
                    });
                }
                let id = self.next_id + pending.len() as u64;
                if id > u64::from(self.max_id) {
                    return Err(Error::DictionaryOverflow {
                        dictionary: self.kind,
                        id,
                        max: u64::from(self.max_id),
                    });
                }
                pending.push(entry);
                id
            }
        };
        // Bounded by max_id above
        Ok(DictionaryId::new(id as u32))
    }

    /// Fails if the sink cannot take the staged entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] for a full bounded sink.
    pub fn ensure_room(&self, pending: &PendingEntries) -> Result<()> {
        crate::ir::ensure_capacity(
            crate::ir::files::dictionary(self.kind),
            self.sink.as_ref(),
            pending.persisted_len(),
        )
    }

    /// Persists and indexes every staged entry, then clears `pending`.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if persisting fails. Entries already
    /// persisted stay indexed.
    pub fn commit(&mut self, pending: &mut PendingEntries) -> Result<()> {
        for entry in pending.iter() {
            let mut header = [0u8; ENTRY_HEADER_LEN];
            // Length checked in resolve
            BigEndian::write_u16(&mut header, entry.len() as u16);
            self.sink.put(&header)?;
            self.sink.put(entry)?;

            let id = DictionaryId::new(self.next_id as u32);
            self.index.insert(entry, id);
            self.next_id += 1;

            if self.next_id.is_power_of_two() && self.next_id >= 1024 {
                tracing::debug!(
                    dictionary = %self.kind,
                    entries = self.next_id,
                    bytes = self.sink.written(),
                    "dictionary grew"
                );
            }
        }
        pending.clear();
        Ok(())
    }

    /// Inserts `entry` if new and returns its ID.
    ///
    /// Idempotent: the same bytes always yield the same ID and are persisted
    /// once.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve) and [`commit`](Self::commit).
    pub fn upsert(&mut self, entry: &[u8]) -> Result<DictionaryId> {
        let mut pending = PendingEntries::new();
        let id = self.resolve(entry, &mut pending)?;
        self.commit(&mut pending)?;
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
