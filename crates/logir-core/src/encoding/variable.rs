//! Variable encodings.
//!
//! Each variable token is tried against these encodings in order, and the
//! first one that fits wins:
//!
//! | Encoding | Grammar | Tag | Cost |
//! |----------|---------|-----|------|
//! | Integer | `-?[1-9][0-9]*` or `0` | `0x11` | one column value |
//! | Decimal | `-?[0-9]*\.[0-9]+` | `0x13` | one column value |
//! | Dictionary | anything else | `0x12` | one column value + dictionary entry on first sight |
//!
//! # Packed decimal layout
//!
//! Standard (64 bit), MSB to LSB:
//!
//! ```text
//! | sign:1 | unused:2 | digits:53 | num_digits-1:4 | digits_after_point-1:4 |
//! ```
//!
//! Compact (32 bit), MSB to LSB:
//!
//! ```text
//! | sign:1 | digits:25 | num_digits-1:3 | digits_after_point-1:3 |
//! ```
//!
//! `digits` is the digit string read as an integer with the point removed.
//! Keeping `num_digits` restores leading zeros (`"0.05"`, `"-.5"` and
//! `"-0.5"` all decode to their exact original bytes).

use logir_common::types::{EncodingWidth, VariableTag};
use logir_common::utils::error::DecodeError;

const STANDARD_DIGIT_BITS: u32 = 53;
const COMPACT_DIGIT_BITS: u32 = 25;

/// The encoding chosen for a single variable token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableEncoding {
    /// Inline signed integer.
    Integer(i64),
    /// Inline packed decimal.
    Decimal(i64),
    /// Needs a variable dictionary entry.
    Dictionary,
}

impl VariableEncoding {
    /// Returns the tag byte written into the logtype for this encoding.
    #[must_use]
    pub const fn tag(&self) -> VariableTag {
        match self {
            Self::Integer(_) => VariableTag::Integer,
            Self::Decimal(_) => VariableTag::Decimal,
            Self::Dictionary => VariableTag::Dictionary,
        }
    }
}

/// Chooses the cheapest lossless encoding for variable tokens.
///
/// The choice depends only on the token bytes and the configured width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariableEncoder {
    width: EncodingWidth,
}

impl VariableEncoder {
    /// Creates an encoder for the given column width.
    #[must_use]
    pub const fn new(width: EncodingWidth) -> Self {
        Self { width }
    }

    /// Returns the column width this encoder targets.
    #[must_use]
    pub const fn width(&self) -> EncodingWidth {
        self.width
    }

    /// Classifies a token.
    #[must_use]
    pub fn encode(&self, token: &[u8]) -> VariableEncoding {
        if let Some(value) = encode_integer(token, self.width) {
            VariableEncoding::Integer(value)
        } else if let Some(value) = encode_decimal(token, self.width) {
            VariableEncoding::Decimal(value)
        } else {
            VariableEncoding::Dictionary
        }
    }
}

/// Parses `token` as a strictly formatted decimal integer.
///
/// Rejects leading zeros (except a lone `0`), a leading `+`, `-0`, and
/// values that overflow the width (i32 for compact, i64 for standard).
/// The returned value is always sign-extended to i64.
#[must_use]
pub fn encode_integer(token: &[u8], width: EncodingWidth) -> Option<i64> {
    let (negative, digits) = match token.split_first()? {
        (b'-', rest) => (true, rest),
        _ => (false, token),
    };
    let &first = digits.first()?;
    if first == b'0' && (negative || digits.len() > 1) {
        return None;
    }

    // Accumulate negatively so i64::MIN parses without overflow
    let mut acc: i64 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return None;
        }
        acc = acc.checked_mul(10)?.checked_sub(i64::from(byte - b'0'))?;
    }
    let value = if negative { acc } else { acc.checked_neg()? };

    match width {
        EncodingWidth::Compact => i32::try_from(value).ok().map(i64::from),
        EncodingWidth::Standard => Some(value),
    }
}

/// Packs `token` as a fixed-point decimal.
///
/// Requires exactly one `.` that is not the final byte, only ASCII digits
/// otherwise, an optional leading `-`, at most 16 (standard) or 8 (compact)
/// digits, and a digit value below 2^53 (standard) or 2^25 (compact).
#[must_use]
pub fn encode_decimal(token: &[u8], width: EncodingWidth) -> Option<i64> {
    let (negative, body) = match token.split_first()? {
        (b'-', rest) => (true, rest),
        _ => (false, token),
    };
    let max_digits = width.max_decimal_digits() as usize;
    if body.len() > max_digits + 1 {
        return None;
    }

    let mut digits: u64 = 0;
    let mut num_digits: u64 = 0;
    let mut point = None;
    for (i, &byte) in body.iter().enumerate() {
        match byte {
            b'0'..=b'9' => {
                digits = digits * 10 + u64::from(byte - b'0');
                num_digits += 1;
            }
            b'.' if point.is_none() => point = Some(i),
            _ => return None,
        }
    }

    let point = point?;
    let after_point = (body.len() - point - 1) as u64;
    if after_point == 0 {
        return None;
    }

    match width {
        EncodingWidth::Standard => {
            if digits >> STANDARD_DIGIT_BITS != 0 {
                return None;
            }
            let mut packed = (digits << 8) | ((num_digits - 1) << 4) | (after_point - 1);
            if negative {
                packed |= 1 << 63;
            }
            Some(packed as i64)
        }
        EncodingWidth::Compact => {
            if digits >> COMPACT_DIGIT_BITS != 0 {
                return None;
            }
            let mut packed = ((digits << 6) | ((num_digits - 1) << 3) | (after_point - 1)) as u32;
            if negative {
                packed |= 1 << 31;
            }
            Some(i64::from(packed as i32))
        }
    }
}

/// Appends the decimal text of `value` to `out`.
pub fn render_integer(value: i64, out: &mut Vec<u8>) {
    let mut buf = [0u8; 20];
    let mut pos = buf.len();
    let mut magnitude = value.unsigned_abs();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (magnitude % 10) as u8;
        magnitude /= 10;
        if magnitude == 0 {
            break;
        }
    }
    if value < 0 {
        out.push(b'-');
    }
    out.extend_from_slice(&buf[pos..]);
}

/// Appends the original text of a packed decimal to `out`.
///
/// # Errors
///
/// Returns [`DecodeError::Corrupt`] if the fields are inconsistent, which
/// no encoder produces.
pub fn render_decimal(encoded: i64, width: EncodingWidth, out: &mut Vec<u8>) -> Result<(), DecodeError> {
    let (negative, digits, num_digits, after_point) = match width {
        EncodingWidth::Standard => {
            let bits = encoded as u64;
            if (bits >> (STANDARD_DIGIT_BITS + 8)) & 0b11 != 0 {
                return Err(DecodeError::corrupt(format!(
                    "decimal {encoded:#x} has padding bits set"
                )));
            }
            (
                bits >> 63 == 1,
                (bits >> 8) & ((1 << STANDARD_DIGIT_BITS) - 1),
                ((bits >> 4) & 0xF) as usize + 1,
                (bits & 0xF) as usize + 1,
            )
        }
        EncodingWidth::Compact => {
            let bits = u64::from(encoded as i32 as u32);
            (
                bits >> 31 == 1,
                (bits >> 6) & ((1 << COMPACT_DIGIT_BITS) - 1),
                ((bits >> 3) & 0x7) as usize + 1,
                (bits & 0x7) as usize + 1,
            )
        }
    };

    if after_point > num_digits {
        return Err(DecodeError::corrupt(format!(
            "decimal {encoded:#x} has {after_point} fraction digits but only {num_digits} digits"
        )));
    }

    // num_digits <= 16 and one slot for the point
    let mut buf = [0u8; 17];
    let mut remaining = digits;
    let mut pos = num_digits + 1;
    for i in 0..num_digits {
        if i == after_point {
            pos -= 1;
            buf[pos] = b'.';
        }
        pos -= 1;
        buf[pos] = b'0' + (remaining % 10) as u8;
        remaining /= 10;
    }
    if after_point == num_digits {
        pos -= 1;
        buf[pos] = b'.';
    }
    if remaining != 0 {
        return Err(DecodeError::corrupt(format!(
            "decimal {encoded:#x} has more digits than its digit count"
        )));
    }

    if negative {
        out.push(b'-');
    }
    out.extend_from_slice(&buf[..=num_digits]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPACT: EncodingWidth = EncodingWidth::Compact;
    const STANDARD: EncodingWidth = EncodingWidth::Standard;

    fn decimal_round_trip(token: &str, width: EncodingWidth) -> String {
        let encoded = encode_decimal(token.as_bytes(), width)
            .unwrap_or_else(|| panic!("{token} should encode as decimal"));
        let mut out = Vec::new();
        render_decimal(encoded, width, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_integer_grammar() {
        assert_eq!(encode_integer(b"0", STANDARD), Some(0));
        assert_eq!(encode_integer(b"42", STANDARD), Some(42));
        assert_eq!(encode_integer(b"-17", STANDARD), Some(-17));

        assert_eq!(encode_integer(b"007", STANDARD), None);
        assert_eq!(encode_integer(b"+5", STANDARD), None);
        assert_eq!(encode_integer(b"-0", STANDARD), None);
        assert_eq!(encode_integer(b"-", STANDARD), None);
        assert_eq!(encode_integer(b"", STANDARD), None);
        assert_eq!(encode_integer(b"12a", STANDARD), None);
        assert_eq!(encode_integer(b"1.0", STANDARD), None);
    }

    #[test]
    fn test_integer_overflow() {
        assert_eq!(
            encode_integer(b"9223372036854775807", STANDARD),
            Some(i64::MAX)
        );
        assert_eq!(
            encode_integer(b"-9223372036854775808", STANDARD),
            Some(i64::MIN)
        );
        assert_eq!(encode_integer(b"9223372036854775808", STANDARD), None);

        assert_eq!(encode_integer(b"2147483647", COMPACT), Some(2147483647));
        assert_eq!(encode_integer(b"-2147483648", COMPACT), Some(-2147483648));
        assert_eq!(encode_integer(b"2147483648", COMPACT), None);
    }

    #[test]
    fn test_decimal_grammar() {
        assert!(encode_decimal(b"0.1", STANDARD).is_some());
        assert!(encode_decimal(b".5", STANDARD).is_some());
        assert!(encode_decimal(b"-.5", STANDARD).is_some());

        assert_eq!(encode_decimal(b"1.", STANDARD), None);
        assert_eq!(encode_decimal(b"12", STANDARD), None);
        assert_eq!(encode_decimal(b"1.2.3", STANDARD), None);
        assert_eq!(encode_decimal(b".", STANDARD), None);
        assert_eq!(encode_decimal(b"-.", STANDARD), None);
        assert_eq!(encode_decimal(b"1.5e3", STANDARD), None);
        assert_eq!(encode_decimal(b"+1.5", STANDARD), None);
    }

    #[test]
    fn test_decimal_digit_limits() {
        assert_eq!(encode_decimal(b"1.23456789012345678", STANDARD), None);
        assert!(encode_decimal(b"1234567890.123456", STANDARD).is_some());
        // 16 digits but above 2^53
        assert_eq!(encode_decimal(b"9999999999.999999", STANDARD), None);

        assert!(encode_decimal(b"1234.5678", COMPACT).is_some());
        assert_eq!(encode_decimal(b"1234.56789", COMPACT), None);
        // 8 digits but above 2^25
        assert_eq!(encode_decimal(b"9999.9999", COMPACT), None);
    }

    #[test]
    fn test_decimal_layout() {
        // 12.5 -> digits 125, 3 digits, 1 after the point
        let packed = encode_decimal(b"12.5", STANDARD).unwrap();
        assert_eq!(packed, (125 << 8) | (2 << 4));

        let negative = encode_decimal(b"-12.5", STANDARD).unwrap();
        assert!(negative < 0);
        assert_eq!(negative & i64::MAX, packed);

        let compact = encode_decimal(b"-12.5", COMPACT).unwrap();
        assert_eq!(compact as i32 as u32, (1 << 31) | (125 << 6) | (2 << 3));
    }

    #[test]
    fn test_decimal_round_trips_exactly() {
        for token in ["0.1", "-0.5", ".5", "-.5", "0.05", "00.10", "3.14159", "-1234567890.123456"] {
            assert_eq!(decimal_round_trip(token, STANDARD), token);
        }
        for token in ["0.1", "-0.5", ".5", "1234.567", "-9.000001"] {
            assert_eq!(decimal_round_trip(token, COMPACT), token);
        }
    }

    #[test]
    fn test_encoder_priority() {
        let encoder = VariableEncoder::new(STANDARD);
        assert_eq!(encoder.encode(b"0"), VariableEncoding::Integer(0));
        assert_eq!(encoder.encode(b"-3"), VariableEncoding::Integer(-3));
        assert!(matches!(encoder.encode(b"0.1"), VariableEncoding::Decimal(_)));
        assert_eq!(encoder.encode(b"007"), VariableEncoding::Dictionary);
        assert_eq!(encoder.encode(b"+5"), VariableEncoding::Dictionary);
        assert_eq!(encoder.encode(b"/a/b"), VariableEncoding::Dictionary);
        assert_eq!(encoder.encode(b"ff"), VariableEncoding::Dictionary);
        assert_eq!(
            encoder.encode(b"1.23456789012345678"),
            VariableEncoding::Dictionary
        );

        let compact = VariableEncoder::new(COMPACT);
        assert_eq!(compact.encode(b"4294967296"), VariableEncoding::Dictionary);
        assert_eq!(encoder.encode(b"4294967296"), VariableEncoding::Integer(4294967296));
    }

    #[test]
    fn test_tags() {
        assert_eq!(VariableEncoding::Integer(1).tag(), VariableTag::Integer);
        assert_eq!(VariableEncoding::Decimal(1).tag(), VariableTag::Decimal);
        assert_eq!(VariableEncoding::Dictionary.tag(), VariableTag::Dictionary);
    }

    #[test]
    fn test_render_integer() {
        let mut out = Vec::new();
        for value in [0, 7, -7, 1234567, i64::MAX, i64::MIN] {
            out.clear();
            render_integer(value, &mut out);
            assert_eq!(out, value.to_string().as_bytes());
        }
    }

    #[test]
    fn test_render_corrupt_decimal() {
        // 1 digit but 2 fraction digits
        let corrupt = (5 << 8) | 1;
        let mut out = Vec::new();
        assert!(render_decimal(corrupt, STANDARD, &mut out).is_err());

        // padding bits set
        let corrupt = (1i64 << 62) | (5 << 8);
        assert!(render_decimal(corrupt, STANDARD, &mut out).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn integers_round_trip(value: i64) {
                let text = value.to_string();
                prop_assert_eq!(encode_integer(text.as_bytes(), STANDARD), Some(value));
                let mut out = Vec::new();
                render_integer(value, &mut out);
                prop_assert_eq!(out, text.into_bytes());
            }

            #[test]
            fn decimals_round_trip(
                negative: bool,
                whole in "[0-9]{0,7}",
                fraction in "[0-9]{1,8}",
            ) {
                let token = format!("{}{whole}.{fraction}", if negative { "-" } else { "" });
                for width in [COMPACT, STANDARD] {
                    if let Some(encoded) = encode_decimal(token.as_bytes(), width) {
                        let mut out = Vec::new();
                        render_decimal(encoded, width, &mut out).unwrap();
                        prop_assert_eq!(out, token.as_bytes());
                    }
                }
                // Up to 15 digits always fit the standard layout
                prop_assert!(encode_decimal(token.as_bytes(), STANDARD).is_some());
            }
        }
    }
}
