//! Buffered sink over any writer.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use logir_common::utils::error::{Error, Result};
use logir_core::storage::ByteSink;

/// Writers that can push buffered data to durable storage.
///
/// `sync` runs once, after the final flush. The default does nothing, which
/// suits in-memory writers and compressors that sync their own inner file.
pub trait SyncWrite: Write + Send {
    /// Makes previously flushed bytes durable.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SyncWrite for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl SyncWrite for Vec<u8> {}

/// Unbounded sink writing through a [`BufWriter`].
pub struct BufferedSink<W: SyncWrite> {
    writer: BufWriter<W>,
    written: u64,
    finished: bool,
}

impl<W: SyncWrite> std::fmt::Debug for BufferedSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedSink")
            .field("written", &self.written)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl BufferedSink<File> {
    /// Creates (or truncates) the file at `path` with a `capacity`-byte buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(Self::with_capacity(capacity, file))
    }
}

impl<W: SyncWrite> BufferedSink<W> {
    /// Wraps `writer` with a `capacity`-byte buffer.
    pub fn with_capacity(capacity: usize, writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, writer),
            written: 0,
            finished: false,
        }
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| Error::Io(err.into_error()))
    }
}

impl<W: SyncWrite> ByteSink for BufferedSink<W> {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::SessionClosed);
        }
        self.writer.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn written(&self) -> u64 {
        self.written
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.flush()?;
        self.writer.get_mut().sync()?;
        Ok(())
    }
}
