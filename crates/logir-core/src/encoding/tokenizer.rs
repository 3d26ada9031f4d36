//! Splits a message into static text and variable tokens.
//!
//! A token is a maximal run of non-delimiter bytes. Non-delimiters are
//! `+ - . / 0-9 A-Z a-z _ \`, so identifiers, paths, and numbers stay intact
//! as single tokens. A run becomes a variable if it:
//!
//! 1. contains a decimal digit, or
//! 2. directly follows `=` and contains a letter, or
//! 3. is at least two bytes long and entirely hex digits.
//!
//! Everything else is static text. The classification is part of the wire
//! contract: two encoders must split a message identically for their
//! logtypes to agree, so it is a heuristic to reproduce, not to refine.

/// Byte range `[begin, end)` of a variable token within a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBounds {
    /// First byte of the token.
    pub begin: usize,
    /// One past the last byte of the token.
    pub end: usize,
}

impl TokenBounds {
    /// Returns the token length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    /// Returns whether the token is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Returns the token bytes within `message`.
    #[inline]
    #[must_use]
    pub fn slice<'a>(&self, message: &'a [u8]) -> &'a [u8] {
        &message[self.begin..self.end]
    }
}

/// Returns whether `byte` separates tokens.
#[inline]
#[must_use]
pub const fn is_delimiter(byte: u8) -> bool {
    !matches!(
        byte,
        b'+' | b'-'..=b'9' | b'A'..=b'Z' | b'\\' | b'_' | b'a'..=b'z'
    )
}

#[inline]
fn could_be_multi_digit_hex(token: &[u8]) -> bool {
    token.len() >= 2 && token.iter().all(u8::is_ascii_hexdigit)
}

/// Finds the next variable token at or after `cursor`.
///
/// Non-variable runs between `cursor` and the returned token are static
/// text; the caller copies `message[cursor..bounds.begin]` into the logtype
/// and resumes from `bounds.end`. Returns `None` once the rest of the
/// message is static.
#[must_use]
pub fn find_next_variable(message: &[u8], cursor: usize) -> Option<TokenBounds> {
    let len = message.len();
    let mut end = cursor;

    while end < len {
        let mut begin = end;
        while begin < len && is_delimiter(message[begin]) {
            begin += 1;
        }
        if begin == len {
            return None;
        }

        let mut has_digit = false;
        let mut has_alpha = false;
        end = begin;
        while end < len {
            let byte = message[end];
            if byte.is_ascii_digit() {
                has_digit = true;
            } else if byte.is_ascii_alphabetic() {
                has_alpha = true;
            } else if is_delimiter(byte) {
                break;
            }
            end += 1;
        }

        let follows_equals = begin > 0 && message[begin - 1] == b'=';
        if has_digit
            || (follows_equals && has_alpha)
            || could_be_multi_digit_hex(&message[begin..end])
        {
            return Some(TokenBounds { begin, end });
        }
    }

    None
}

/// Iterator over the variable tokens of a message, in order.
#[derive(Debug, Clone)]
pub struct VariableTokens<'a> {
    message: &'a [u8],
    cursor: usize,
}

impl<'a> VariableTokens<'a> {
    /// Creates an iterator over the variables in `message`.
    #[must_use]
    pub fn new(message: &'a [u8]) -> Self {
        Self { message, cursor: 0 }
    }
}

impl Iterator for VariableTokens<'_> {
    type Item = TokenBounds;

    fn next(&mut self) -> Option<TokenBounds> {
        let bounds = find_next_variable(self.message, self.cursor)?;
        self.cursor = bounds.end;
        Some(bounds)
    }
}
