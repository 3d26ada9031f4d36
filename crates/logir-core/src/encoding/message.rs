//! Logtype assembly.

use logir_common::types::{EncodingWidth, VariableTag};
use smallvec::SmallVec;

use super::tokenizer::{TokenBounds, find_next_variable};
use super::variable::{VariableEncoder, VariableEncoding};

/// One variable of an encoded message, in token order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedVariable {
    /// Inline integer value.
    Integer(i64),
    /// Inline packed decimal value.
    Decimal(i64),
    /// Token to be resolved against the variable dictionary.
    Dictionary(TokenBounds),
}

/// A message split into its logtype and variables.
///
/// Dictionary variables hold bounds into the source message rather than
/// copies, so an `EncodedMessage` is only meaningful next to the message it
/// was built from. Buffers are reused across [`MessageEncoder::encode_into`]
/// calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedMessage {
    logtype: Vec<u8>,
    variables: SmallVec<[EncodedVariable; 8]>,
}

impl EncodedMessage {
    /// Creates an empty encoded message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the logtype bytes.
    #[must_use]
    pub fn logtype(&self) -> &[u8] {
        &self.logtype
    }

    /// Returns the variables in token order.
    #[must_use]
    pub fn variables(&self) -> &[EncodedVariable] {
        &self.variables
    }

    /// Iterates over the dictionary variable tokens of `message`.
    pub fn dictionary_tokens<'a>(&'a self, message: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.variables.iter().filter_map(move |variable| match variable {
            EncodedVariable::Dictionary(bounds) => Some(bounds.slice(message)),
            _ => None,
        })
    }

    /// Returns how many variables need a dictionary lookup.
    #[must_use]
    pub fn dictionary_count(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| matches!(v, EncodedVariable::Dictionary(_)))
            .count()
    }

    fn clear(&mut self) {
        self.logtype.clear();
        self.variables.clear();
    }

    /// Appends static text. Bytes that would read back as tags become
    /// one-byte dictionary variables.
    fn push_static(&mut self, message: &[u8], begin: usize, end: usize) {
        let mut start = begin;
        for (offset, &byte) in message[begin..end].iter().enumerate() {
            if VariableTag::from_byte(byte).is_some() {
                let position = begin + offset;
                self.logtype.extend_from_slice(&message[start..position]);
                self.logtype.push(VariableTag::Dictionary.as_byte());
                self.variables.push(EncodedVariable::Dictionary(TokenBounds {
                    begin: position,
                    end: position + 1,
                }));
                start = position + 1;
            }
        }
        self.logtype.extend_from_slice(&message[start..end]);
    }
}

/// Turns messages into logtypes and variable lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageEncoder {
    variables: VariableEncoder,
}

impl MessageEncoder {
    /// Creates an encoder for the given width.
    #[must_use]
    pub const fn new(width: EncodingWidth) -> Self {
        Self {
            variables: VariableEncoder::new(width),
        }
    }

    /// Returns the column width this encoder targets.
    #[must_use]
    pub const fn width(&self) -> EncodingWidth {
        self.variables.width()
    }

    /// Encodes `message` into a fresh [`EncodedMessage`].
    #[must_use]
    pub fn encode(&self, message: &[u8]) -> EncodedMessage {
        let mut encoded = EncodedMessage::new();
        self.encode_into(message, &mut encoded);
        encoded
    }

    /// Encodes `message`, reusing the buffers of `out`.
    ///
    /// Never fails: any byte sequence, including empty and non-UTF-8
    /// input, has an encoding. Every variable token is replaced by exactly
    /// one tag byte, so the logtype is never longer than the message. A
    /// static byte equal to a tag byte is itself stored as a dictionary
    /// variable.
    pub fn encode_into(&self, message: &[u8], out: &mut EncodedMessage) {
        out.clear();
        out.logtype.reserve(message.len());

        let mut cursor = 0;
        while let Some(bounds) = find_next_variable(message, cursor) {
            out.push_static(message, cursor, bounds.begin);

            let encoding = self.variables.encode(bounds.slice(message));
            out.logtype.push(encoding.tag().as_byte());
            out.variables.push(match encoding {
                VariableEncoding::Integer(value) => EncodedVariable::Integer(value),
                VariableEncoding::Decimal(value) => EncodedVariable::Decimal(value),
                VariableEncoding::Dictionary => EncodedVariable::Dictionary(bounds),
            });

            cursor = bounds.end;
        }
        out.push_static(message, cursor, message.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_message() {
        let encoder = MessageEncoder::new(EncodingWidth::Standard);
        let message = b"user=42 path=/a/b id=ff";
        let encoded = encoder.encode(message);

        assert_eq!(encoded.logtype(), b"user=\x11 path=\x12 id=\x12");
        assert_eq!(encoded.variables()[0], EncodedVariable::Integer(42));
        assert_eq!(encoded.dictionary_count(), 2);
        let tokens: Vec<&[u8]> = encoded.dictionary_tokens(message).collect();
        assert_eq!(tokens, vec![&b"/a/b"[..], &b"ff"[..]]);
    }

    #[test]
    fn test_decimal_and_static_text() {
        let encoder = MessageEncoder::new(EncodingWidth::Compact);
        let encoded = encoder.encode(b"load avg 0.25 on cpu");
        assert_eq!(encoded.logtype(), b"load avg \x13 on cpu");
        assert!(matches!(encoded.variables(), [EncodedVariable::Decimal(_)]));
    }

    #[test]
    fn test_no_variables() {
        let encoder = MessageEncoder::default();
        let encoded = encoder.encode(b"Starting server");
        assert_eq!(encoded.logtype(), b"Starting server");
        assert!(encoded.variables().is_empty());

        let empty = encoder.encode(b"");
        assert!(empty.logtype().is_empty());
        assert!(empty.variables().is_empty());
    }

    #[test]
    fn test_identical_templates() {
        let encoder = MessageEncoder::new(EncodingWidth::Standard);
        let a = encoder.encode(b"Task 12 finished in 0.5s");
        let b = encoder.encode(b"Task 98 finished in 3.1s");
        assert_eq!(a.logtype(), b.logtype());
        assert_ne!(a.variables(), b.variables());
    }

    #[test]
    fn test_buffers_are_reset() {
        let encoder = MessageEncoder::new(EncodingWidth::Standard);
        let mut encoded = EncodedMessage::new();
        encoder.encode_into(b"a 1 b 2 c 3", &mut encoded);
        assert_eq!(encoded.variables().len(), 3);
        encoder.encode_into(b"x 9", &mut encoded);
        assert_eq!(encoded.logtype(), b"x \x11");
        assert_eq!(encoded.variables(), &[EncodedVariable::Integer(9)]);
    }

    #[test]
    fn test_static_tag_bytes() {
        let encoder = MessageEncoder::new(EncodingWidth::Standard);
        let message = b"a\x11b 7 \x13";
        let encoded = encoder.encode(message);
        assert_eq!(encoded.logtype(), b"a\x12b \x11 \x12");
        assert_eq!(encoded.variables().len(), 3);
        let tokens: Vec<&[u8]> = encoded.dictionary_tokens(message).collect();
        assert_eq!(tokens, vec![&b"\x11"[..], &b"\x13"[..]]);
    }

    #[test]
    fn test_logtype_never_longer() {
        let encoder = MessageEncoder::new(EncodingWidth::Compact);
        for message in [&b"0"[..], b"a=b", b"\xff\xfe 12 \x00", b"0.1.2.3 -5 ab"] {
            assert!(encoder.encode(message).logtype().len() <= message.len());
        }
    }
}
