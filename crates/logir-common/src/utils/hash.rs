//! Hash map aliases used on the encoding hot path.
//!
//! `hashbrown` with `ahash` state is noticeably faster than the std SipHash
//! default for the short byte keys the dictionaries see.

/// Hash map with `ahash` state.
pub type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// Hash set with `ahash` state.
pub type FastHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

