//! Wire-format constants shared by writers and readers.
//!
//! # Column widths
//!
//! | Width | Logtype ID | Variable value | Max decimal digits |
//! |-------|------------|----------------|--------------------|
//! | Compact | u16 | i32 | 8 |
//! | Standard | u32 | i64 | 16 |
//!
//! Timestamps are always i64. All multi-byte values are big-endian.

use serde::{Deserialize, Serialize};

/// Version of the persisted layout written by this crate.
pub const FORMAT_VERSION: u16 = 1;

/// Tag byte embedded in a logtype in place of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VariableTag {
    /// Inline signed integer.
    Integer = 0x11,
    /// Variable dictionary reference.
    Dictionary = 0x12,
    /// Inline packed decimal.
    Decimal = 0x13,
}

impl VariableTag {
    /// Returns the tag byte.
    #[inline]
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Interprets a logtype byte as a tag, if it is one.
    #[inline]
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x11 => Some(Self::Integer),
            0x12 => Some(Self::Dictionary),
            0x13 => Some(Self::Decimal),
            _ => None,
        }
    }
}

/// Numeric width of the logtype-id and variable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncodingWidth {
    /// 16-bit logtype IDs, 32-bit variable values.
    #[default]
    Compact,
    /// 32-bit logtype IDs, 64-bit variable values.
    Standard,
}

impl EncodingWidth {
    /// Selects the width from the `compact_encoding` flag.
    #[must_use]
    pub const fn from_compact(compact: bool) -> Self {
        if compact { Self::Compact } else { Self::Standard }
    }

    /// Returns whether this is the compact width.
    #[must_use]
    pub const fn is_compact(self) -> bool {
        matches!(self, Self::Compact)
    }

    /// Bytes per entry in the logtype-id column.
    #[must_use]
    pub const fn logtype_id_bytes(self) -> usize {
        match self {
            Self::Compact => 2,
            Self::Standard => 4,
        }
    }

    /// Bytes per entry in the variable column.
    #[must_use]
    pub const fn variable_bytes(self) -> usize {
        match self {
            Self::Compact => 4,
            Self::Standard => 8,
        }
    }

    /// Largest logtype ID the logtype-id column can hold.
    #[must_use]
    pub const fn max_logtype_id(self) -> u32 {
        match self {
            Self::Compact => u16::MAX as u32,
            Self::Standard => u32::MAX,
        }
    }

    /// Largest variable dictionary ID the variable column can hold.
    #[must_use]
    pub const fn max_variable_id(self) -> u32 {
        match self {
            Self::Compact => i32::MAX as u32,
            Self::Standard => u32::MAX,
        }
    }

    /// Largest number of significant digits in a packed decimal.
    #[must_use]
    pub const fn max_decimal_digits(self) -> u32 {
        match self {
            Self::Compact => 8,
            Self::Standard => 16,
        }
    }

    /// Returns a human-readable name for the width.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Standard => "standard",
        }
    }
}

/// How a compression dictionary keys its hash index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyMode {
    /// Owned copy of the entry bytes.
    Direct,
    /// SHA-256 digest of the entry bytes.
    #[default]
    Digest,
}
