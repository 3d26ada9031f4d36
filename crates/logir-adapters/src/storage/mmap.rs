//! Fixed-capacity memory-mapped sink.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use logir_common::utils::error::{Error, Result};
use logir_core::storage::ByteSink;
use memmap2::MmapMut;

/// Sink over a file pre-allocated to its full capacity and mapped writable.
///
/// The file is truncated to the bytes actually written when the sink is
/// finished or dropped, whichever comes first.
pub struct MmapSink {
    name: String,
    path: PathBuf,
    file: Option<File>,
    map: Option<MmapMut>,
    capacity: u64,
    position: u64,
}

impl std::fmt::Debug for MmapSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapSink")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("position", &self.position)
            .field("open", &self.file.is_some())
            .finish_non_exhaustive()
    }
}

impl MmapSink {
    /// Creates (or truncates) the file at `path` and maps `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, sized, or mapped.
    pub fn create(path: impl AsRef<Path>, capacity: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(capacity)?;

        // A zero-length mapping is rejected on some platforms
        let map = if capacity == 0 {
            None
        } else {
            // SAFETY: the file was just created and truncated by this sink, is
            // exclusively owned by it, and is never resized while mapped.
            #[allow(unsafe_code)]
            let map = unsafe { MmapMut::map_mut(&file)? };
            Some(map)
        };

        Ok(Self {
            name,
            path,
            file: Some(file),
            map,
            capacity,
            position: 0,
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the pre-allocated capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn release(&mut self) -> Result<()> {
        if let Some(map) = self.map.take() {
            map.flush()?;
            // Unmap before shrinking the file underneath it
            drop(map);
        }
        if let Some(file) = self.file.take() {
            file.set_len(self.position)?;
            file.sync_all()?;
            tracing::debug!(
                path = %self.path.display(),
                written = self.position,
                capacity = self.capacity,
                "mapped stream truncated"
            );
        }
        Ok(())
    }
}

impl ByteSink for MmapSink {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::SessionClosed);
        }
        let available = self.capacity - self.position;
        let requested = bytes.len() as u64;
        if requested > available {
            return Err(Error::CapacityExceeded {
                stream: self.name.clone(),
                capacity: self.capacity,
                available,
                requested,
            });
        }
        if let Some(map) = self.map.as_mut() {
            let start = self.position as usize;
            map[start..start + bytes.len()].copy_from_slice(bytes);
        }
        self.position += requested;
        Ok(())
    }

    fn remaining(&self) -> Option<u64> {
        Some(self.capacity - self.position)
    }

    fn written(&self) -> u64 {
        self.position
    }

    fn finish(&mut self) -> Result<()> {
        self.release()
    }
}

impl Drop for MmapSink {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(err) = self.release() {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to release mapped stream");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_finish_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("variable.bin");

        let mut sink = MmapSink::create(&path, 1024).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1024);

        sink.put(b"abcd").unwrap();
        sink.put(b"ef").unwrap();
        assert_eq!(sink.written(), 6);
        assert_eq!(sink.remaining(), Some(1018));

        sink.finish().unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
        assert!(matches!(sink.put(b"g"), Err(Error::SessionClosed)));
    }

    #[test]
    fn test_drop_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ts.bin");
        {
            let mut sink = MmapSink::create(&path, 64).unwrap();
            sink.put(&7i64.to_be_bytes()).unwrap();
        }
        assert_eq!(std::fs::read(&path).unwrap(), 7i64.to_be_bytes());
    }

    #[test]
    fn test_capacity_exceeded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logtype.bin");

        let mut sink = MmapSink::create(&path, 4).unwrap();
        sink.put(b"abc").unwrap();
        let err = sink.put(b"de").unwrap_err();
        match err {
            Error::CapacityExceeded {
                stream,
                capacity,
                available,
                requested,
            } => {
                assert_eq!(stream, "logtype.bin");
                assert_eq!((capacity, available, requested), (4, 1, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
        sink.finish().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_zero_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");

        let mut sink = MmapSink::create(&path, 0).unwrap();
        sink.put(b"").unwrap();
        assert!(sink.put(b"x").is_err());
        sink.finish().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
