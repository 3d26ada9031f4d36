//! Dictionary identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense, 0-based identifier of a dictionary entry.
///
/// IDs are assigned in first-sight order by one dictionary instance and are
/// never reused or reassigned for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DictionaryId(u32);

impl DictionaryId {
    /// Creates a new dictionary ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the ID as an index into an ID-ordered entry table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DictionaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two independent dictionary namespaces of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DictionaryKind {
    /// Message templates with variables replaced by tag bytes.
    Logtype,
    /// Variables that have no inline numeric encoding.
    Variable,
}

impl DictionaryKind {
    /// Returns a human-readable name for the dictionary.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Logtype => "logtype",
            Self::Variable => "variable",
        }
    }
}

impl fmt::Display for DictionaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
