//! Byte sinks.
//!
//! Every stream a writer produces (dictionaries, columns, the combined
//! stream) goes to a [`ByteSink`]. Sinks are append-only; nothing written is
//! ever rewritten.
//!
//! | Sink | Crate | Capacity |
//! |------|-------|----------|
//! | [`MemorySink`] | logir-core | unbounded, or a fixed limit for tests |
//! | `BufferedSink` | logir-adapters | unbounded |
//! | `MmapSink` | logir-adapters | fixed, pre-allocated |

use std::sync::Arc;

use logir_common::utils::error::{Error, Result};
use parking_lot::Mutex;

/// Append-only destination for one IR stream.
pub trait ByteSink: Send {
    /// Appends `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on write failure, or
    /// [`Error::CapacityExceeded`] if a fixed-capacity sink is full. A
    /// failed put may have written a prefix of `bytes`.
    fn put(&mut self, bytes: &[u8]) -> Result<()>;

    /// Bytes still available, or `None` for unbounded sinks.
    fn remaining(&self) -> Option<u64> {
        None
    }

    /// Total bytes accepted so far.
    fn written(&self) -> u64;

    /// Flushes and releases the sink. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if flushing or truncating fails.
    fn finish(&mut self) -> Result<()>;
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).put(bytes)
    }

    fn remaining(&self) -> Option<u64> {
        (**self).remaining()
    }

    fn written(&self) -> u64 {
        (**self).written()
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Growable in-memory sink.
///
/// Clones share the same buffer, so a caller can keep a handle and read the
/// bytes after the writer that owns the sink has been closed.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    limit: Option<u64>,
}

impl MemorySink {
    /// Creates an unbounded sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that refuses writes past `limit` bytes.
    #[must_use]
    pub fn bounded(limit: u64) -> Self {
        Self {
            buffer: Arc::default(),
            limit: Some(limit),
        }
    }

    /// Returns a copy of the bytes written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Returns whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSink for MemorySink {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let mut buffer = self.buffer.lock();
        if let Some(limit) = self.limit {
            let available = limit.saturating_sub(buffer.len() as u64);
            if bytes.len() as u64 > available {
                return Err(Error::CapacityExceeded {
                    stream: "memory".to_string(),
                    capacity: limit,
                    available,
                    requested: bytes.len() as u64,
                });
            }
        }
        buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn remaining(&self) -> Option<u64> {
        let len = self.buffer.lock().len() as u64;
        self.limit.map(|limit| limit.saturating_sub(len))
    }

    fn written(&self) -> u64 {
        self.buffer.lock().len() as u64
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
