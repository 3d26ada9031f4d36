//! Hash indexes from entry bytes to dictionary IDs.

use logir_common::types::{DictionaryId, KeyMode};
use logir_common::utils::hash::{FastHashMap, FastHashSet};
use sha2::{Digest as _, Sha256};

/// SHA-256 digest of a dictionary entry.
pub type Digest = [u8; 32];

/// Returns the SHA-256 digest of `bytes`.
#[inline]
#[must_use]
pub fn digest(bytes: &[u8]) -> Digest {
    Sha256::digest(bytes).into()
}

/// Lookup structure behind a compression dictionary.
///
/// Implementations own their keys: `insert` copies or hashes the bytes, and
/// no caller buffer outlives the call.
pub trait KeyIndex: Send + std::fmt::Debug {
    /// Returns the ID previously inserted for `bytes`.
    fn get(&self, bytes: &[u8]) -> Option<DictionaryId>;

    /// Records `id` for `bytes`.
    fn insert(&mut self, bytes: &[u8], id: DictionaryId);

    /// Returns the number of keys.
    fn len(&self) -> usize;

    /// Returns whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the key mode this index implements.
    fn mode(&self) -> KeyMode;
}

/// Creates an empty index for `mode`.
#[must_use]
pub fn new_index(mode: KeyMode) -> Box<dyn KeyIndex> {
    match mode {
        KeyMode::Direct => Box::new(DirectIndex::default()),
        KeyMode::Digest => Box::new(DigestIndex::default()),
    }
}

/// Keys entries by an owned copy of their bytes.
#[derive(Debug, Default)]
pub struct DirectIndex {
    map: FastHashMap<Box<[u8]>, DictionaryId>,
}

impl KeyIndex for DirectIndex {
    fn get(&self, bytes: &[u8]) -> Option<DictionaryId> {
        self.map.get(bytes).copied()
    }

    fn insert(&mut self, bytes: &[u8], id: DictionaryId) {
        self.map.insert(bytes.into(), id);
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn mode(&self) -> KeyMode {
        KeyMode::Direct
    }
}

/// Keys entries by their SHA-256 digest.
///
/// Two distinct entries with the same digest would share an ID.
#[derive(Debug, Default)]
pub struct DigestIndex {
    map: FastHashMap<Digest, DictionaryId>,
}

impl DigestIndex {
    /// Returns the ID inserted for a precomputed digest.
    #[must_use]
    pub fn get_digest(&self, key: &Digest) -> Option<DictionaryId> {
        self.map.get(key).copied()
    }

    /// Records `id` for a precomputed digest.
    pub fn insert_digest(&mut self, key: Digest, id: DictionaryId) {
        self.map.insert(key, id);
    }
}

impl KeyIndex for DigestIndex {
    fn get(&self, bytes: &[u8]) -> Option<DictionaryId> {
        self.get_digest(&digest(bytes))
    }

    fn insert(&mut self, bytes: &[u8], id: DictionaryId) {
        self.map.insert(digest(bytes), id);
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn mode(&self) -> KeyMode {
        KeyMode::Digest
    }
}

/// Set of digests already transmitted on a combined stream.
#[derive(Debug, Default)]
pub struct SeenDigests {
    seen: FastHashSet<Digest>,
}

impl SeenDigests {
    /// Marks `key` as seen, returning whether it was new.
    pub fn insert(&mut self, key: Digest) -> bool {
        self.seen.insert(key)
    }

    /// Returns whether `key` has been seen.
    #[must_use]
    pub fn contains(&self, key: &Digest) -> bool {
        self.seen.contains(key)
    }

    /// Returns the number of distinct digests seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns whether no digest has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexes_agree() {
        for mode in [KeyMode::Direct, KeyMode::Digest] {
            let mut index = new_index(mode);
            assert_eq!(index.mode(), mode);
            assert!(index.is_empty());

            index.insert(b"alpha", DictionaryId::new(0));
            index.insert(b"beta", DictionaryId::new(1));

            assert_eq!(index.get(b"alpha"), Some(DictionaryId::new(0)));
            assert_eq!(index.get(b"beta"), Some(DictionaryId::new(1)));
            assert_eq!(index.get(b"gamma"), None);
            assert_eq!(index.len(), 2);
        }
    }

    #[test]
    fn test_keys_are_owned() {
        let mut index = DirectIndex::default();
        let mut buffer = b"transient".to_vec();
        index.insert(&buffer, DictionaryId::new(7));
        buffer.fill(b'x');
        assert_eq!(index.get(b"transient"), Some(DictionaryId::new(7)));
    }

    #[test]
    fn test_digest_is_sha256() {
        let empty = digest(b"");
        assert_eq!(empty[..4], [0xe3, 0xb0, 0xc4, 0x42]);
        assert_ne!(digest(b"a"), digest(b"b"));
    }

    #[test]
    fn test_seen_digests() {
        let mut seen = SeenDigests::default();
        let key = digest(b"template");
        assert!(seen.insert(key));
        assert!(!seen.insert(key));
        assert!(seen.contains(&key));
        assert_eq!(seen.len(), 1);
    }
}
