//! Log records as seen by the collaborator.

use std::io::{self, Write};

/// A single log event: epoch-millisecond timestamp plus raw message bytes.
///
/// The message is treated as opaque bytes; it need not be valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Message bytes, without the timestamp.
    pub message: Vec<u8>,
}

impl LogRecord {
    /// Creates a new record.
    pub fn new(timestamp: i64, message: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    /// Returns the message as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn message_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }

    /// Writes `<timestamp> <message>\n` to `out`.
    ///
    /// Timestamp rendering is left to the caller since the layout pattern
    /// belongs to the logging framework, not the codec.
    pub fn render_line<W, F>(&self, out: &mut W, format_timestamp: F) -> io::Result<()>
    where
        W: Write,
        F: FnOnce(i64, &mut W) -> io::Result<()>,
    {
        format_timestamp(self.timestamp, out)?;
        out.write_all(b" ")?;
        out.write_all(&self.message)?;
        out.write_all(b"\n")
    }
}
