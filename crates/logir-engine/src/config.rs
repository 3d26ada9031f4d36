//! Session configuration.

use std::path::{Path, PathBuf};

use logir_common::types::{EncodingWidth, FORMAT_VERSION, KeyMode};
use logir_common::utils::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default buffer capacity, and region size per stream for the
/// memory-mapped backend.
pub const DEFAULT_BUFFER_SIZE: u64 = 64 * 1024 * 1024;

/// Upper bound on the in-process write buffer of a buffered stream.
///
/// `buffer_size` also sizes memory-mapped regions, where a large value only
/// reserves address space. Buffered streams allocate theirs eagerly.
pub const MAX_WRITE_BUFFER: u64 = 1024 * 1024;

/// How on-disk streams are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Unbounded files written through a buffer.
    #[default]
    Buffered,
    /// Files pre-allocated to `buffer_size` and mapped into memory,
    /// truncated to their written length on close.
    MemoryMapped,
}

/// Layout of the intermediate representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IrFormat {
    /// Separate dictionary and column streams.
    #[default]
    Columnar,
    /// One self-describing opcode stream.
    Stream,
}

impl IrFormat {
    /// Returns a short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Columnar => "columnar",
            Self::Stream => "stream",
        }
    }
}

/// Session configuration.
///
/// # Examples
///
/// ```
/// use logir_engine::config::{Backend, Config};
///
/// let config = Config::persistent("/var/log/app/session-1")
///     .with_backend(Backend::MemoryMapped)
///     .with_buffer_size(16 * 1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Session directory. `None` for in-memory sessions.
    pub path: Option<PathBuf>,
    /// 16-bit logtype IDs and 32-bit variables instead of 32/64-bit.
    pub compact_encoding: bool,
    /// How compression dictionaries key their index.
    pub key_mode: KeyMode,
    /// Stream backend for on-disk sessions.
    pub backend: Backend,
    /// Write buffer capacity, or region size per stream when memory mapped.
    pub buffer_size: u64,
    /// IR layout.
    pub format: IrFormat,
    /// Format version to write.
    pub format_version: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            compact_encoding: true,
            key_mode: KeyMode::default(),
            backend: Backend::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            format: IrFormat::default(),
            format_version: FORMAT_VERSION,
        }
    }
}

impl Config {
    /// Creates a configuration for an in-memory session.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a configuration for a session stored under `path`.
    #[must_use]
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Sets the encoding width.
    #[must_use]
    pub fn with_compact_encoding(mut self, compact: bool) -> Self {
        self.compact_encoding = compact;
        self
    }

    /// Sets the dictionary key mode.
    #[must_use]
    pub fn with_key_mode(mut self, mode: KeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    /// Sets the stream backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the buffer size in bytes.
    #[must_use]
    pub fn with_buffer_size(mut self, size: u64) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the IR layout.
    #[must_use]
    pub fn with_format(mut self, format: IrFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the format version.
    #[must_use]
    pub fn with_format_version(mut self, version: u16) -> Self {
        self.format_version = version;
        self
    }

    /// Returns the encoding width selected by `compact_encoding`.
    #[must_use]
    pub const fn width(&self) -> EncodingWidth {
        EncodingWidth::from_compact(self.compact_encoding)
    }

    /// Returns the capacity of one buffered stream's write buffer.
    #[must_use]
    pub fn write_buffer_capacity(&self) -> usize {
        usize::try_from(self.buffer_size.min(MAX_WRITE_BUFFER)).unwrap_or(usize::MAX)
    }

    /// Checks the options that do not depend on where the session lives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero buffer size or an unsupported
    /// format version.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer size must be positive".into()));
        }
        if self.format_version != FORMAT_VERSION {
            return Err(Error::Config(format!(
                "format version {} is not supported (expected {FORMAT_VERSION})",
                self.format_version
            )));
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), and also requires a path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or has no
    /// path.
    pub fn validate_persistent(&self) -> Result<&Path> {
        self.validate()?;
        self.path
            .as_deref()
            .ok_or_else(|| Error::Config("on-disk sessions need a path".into()))
    }
}
