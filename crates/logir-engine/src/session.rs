//! Session management.
//!
//! A [`Session`] owns one encoder, one [`IrWriter`], and every stream the
//! writer produces. Records go in with [`Session::append`]; the streams are
//! flushed, truncated, and synced by [`Session::close`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use logir_adapters::storage::{BufferedSink, MmapSink, SessionLayout};
use logir_common::utils::error::{Error, Result};
use logir_core::encoding::{EncodedMessage, MessageEncoder};
use logir_core::ir::{ColumnarSinks, ColumnarWriter, IrWriter, StreamWriter, WriterStats, files};
use logir_core::storage::{ByteSink, MemorySink};
use parking_lot::Mutex;

use crate::config::{Backend, Config, IrFormat};
use crate::metadata::SessionMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Poisoned,
    Closed,
}

/// Streams of an in-memory session.
///
/// Handles share their buffers with the session's sinks, so the bytes can
/// be read at any point, typically after [`Session::close`].
#[derive(Debug, Clone)]
pub struct MemoryStreams {
    metadata: SessionMetadata,
    sinks: Vec<(&'static str, MemorySink)>,
}

impl MemoryStreams {
    /// Returns the session metadata.
    #[must_use]
    pub fn metadata(&self) -> SessionMetadata {
        self.metadata
    }

    /// Returns a copy of the stream called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.sinks
            .iter()
            .find(|(stream, _)| *stream == name)
            .map(|(_, sink)| sink.contents())
    }

    /// Returns the stream names this session writes.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sinks.iter().map(|(name, _)| *name)
    }

    fn sink(&mut self, name: &'static str) -> Box<dyn ByteSink> {
        let sink = MemorySink::new();
        self.sinks.push((name, sink.clone()));
        Box::new(sink)
    }
}

#[derive(Debug)]
enum Location {
    Disk(SessionLayout),
    Memory(MemoryStreams),
}

/// Counters returned by [`Session::close`] and [`Session::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Writer counters: records, dictionary sizes, bytes per stream.
    pub stats: WriterStats,
    /// Records refused with a record-fatal error.
    pub rejected_records: u64,
    /// Session directory, if on disk.
    pub path: Option<PathBuf>,
}

impl SessionSummary {
    /// Returns the number of records written.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.stats.records
    }

    /// Returns the total bytes across all streams.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.stats.total_bytes()
    }
}

/// A log compression session.
///
/// # Examples
///
/// ```
/// use logir_engine::{Config, Session, SessionReader};
///
/// let mut session = Session::in_memory(Config::in_memory()).unwrap();
/// session.append(1_700_000_000, b"user=42 logged in").unwrap();
/// let summary = session.close().unwrap();
/// assert_eq!(summary.records(), 1);
///
/// let streams = session.memory_streams().unwrap();
/// let reader = SessionReader::from_memory(streams).unwrap();
/// let records = reader.read_all().unwrap();
/// assert_eq!(records[0].message, b"user=42 logged in");
/// ```
pub struct Session {
    config: Config,
    metadata: SessionMetadata,
    encoder: MessageEncoder,
    /// Reused across appends.
    encoded: EncodedMessage,
    writer: Box<dyn IrWriter>,
    location: Location,
    state: State,
    rejected_records: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("location", &self.location)
            .field("state", &self.state)
            .field("rejected_records", &self.rejected_records)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens an on-disk session under `config.path`.
    ///
    /// The directory is created if needed; existing streams in it are
    /// truncated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration, or an I/O
    /// error if the directory, metadata, or streams cannot be created.
    pub fn open(config: Config) -> Result<Self> {
        let root = config.validate_persistent()?;
        let layout = SessionLayout::create(root)?;
        let metadata = SessionMetadata::from_config(&config);
        metadata.write(layout.metadata())?;

        let writer: Box<dyn IrWriter> = match config.format {
            IrFormat::Columnar => {
                let sinks = layout.columnar_sinks(|path| open_sink(&config, path))?;
                Box::new(ColumnarWriter::new(config.width(), config.key_mode, sinks))
            }
            IrFormat::Stream => Box::new(StreamWriter::new(
                config.width(),
                open_sink(&config, &layout.combined())?,
            )),
        };

        tracing::info!(
            path = %layout.root().display(),
            format = config.format.name(),
            width = config.width().name(),
            backend = ?config.backend,
            "session opened"
        );
        Ok(Self::with_writer(config, metadata, writer, Location::Disk(layout)))
    }

    /// Opens a session whose streams live in memory.
    ///
    /// `config.path` and `config.backend` are ignored. The streams are
    /// available through [`memory_streams`](Self::memory_streams).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration.
    pub fn in_memory(config: Config) -> Result<Self> {
        config.validate()?;
        let metadata = SessionMetadata::from_config(&config);
        let mut streams = MemoryStreams {
            metadata,
            sinks: Vec::with_capacity(5),
        };

        let writer: Box<dyn IrWriter> = match config.format {
            IrFormat::Columnar => {
                let sinks = ColumnarSinks {
                    logtype_dictionary: streams.sink(files::LOGTYPE_DICTIONARY),
                    variable_dictionary: streams.sink(files::VARIABLE_DICTIONARY),
                    timestamps: streams.sink(files::TIMESTAMPS),
                    logtype_ids: streams.sink(files::LOGTYPE_IDS),
                    variables: streams.sink(files::VARIABLES),
                };
                Box::new(ColumnarWriter::new(config.width(), config.key_mode, sinks))
            }
            IrFormat::Stream => Box::new(StreamWriter::new(config.width(), streams.sink(files::COMBINED))),
        };

        tracing::info!(
            format = config.format.name(),
            width = config.width().name(),
            "in-memory session opened"
        );
        Ok(Self::with_writer(config, metadata, writer, Location::Memory(streams)))
    }

    fn with_writer(
        config: Config,
        metadata: SessionMetadata,
        writer: Box<dyn IrWriter>,
        location: Location,
    ) -> Self {
        let encoder = MessageEncoder::new(config.width());
        Self {
            config,
            metadata,
            encoder,
            encoded: EncodedMessage::default(),
            writer,
            location,
            state: State::Open,
            rejected_records: 0,
        }
    }

    /// Encodes and writes one record.
    ///
    /// # Errors
    ///
    /// - [`Error::DictionaryOverflow`] or [`Error::EntryTooLong`]: the record
    ///   was dropped, the session keeps accepting records.
    /// - [`Error::Io`] or [`Error::CapacityExceeded`]: the session is now
    ///   poisoned.
    /// - [`Error::SessionPoisoned`] or [`Error::SessionClosed`]: nothing was
    ///   attempted.
    pub fn append(&mut self, timestamp: i64, message: &[u8]) -> Result<()> {
        match self.state {
            State::Open => {}
            State::Poisoned => return Err(Error::SessionPoisoned),
            State::Closed => return Err(Error::SessionClosed),
        }

        self.encoder.encode_into(message, &mut self.encoded);
        let result = self.writer.write_record(timestamp, message, &self.encoded);
        if let Err(err) = &result {
            if err.poisons_session() {
                self.state = State::Poisoned;
                tracing::debug!(error = %err, "session poisoned");
            } else if err.is_record_fatal() {
                self.rejected_records += 1;
            }
        }
        result
    }

    /// Finishes every stream and returns the final counters.
    ///
    /// Closing a poisoned session still releases its streams. Closing twice
    /// returns the same summary.
    ///
    /// # Errors
    ///
    /// Returns the first error from finishing the streams; every stream is
    /// still finished.
    pub fn close(&mut self) -> Result<SessionSummary> {
        if self.state == State::Closed {
            return Ok(self.stats());
        }
        let poisoned = self.state == State::Poisoned;
        self.state = State::Closed;

        self.writer.finish()?;
        let summary = self.stats();
        tracing::info!(
            records = summary.records(),
            logtypes = summary.stats.logtypes,
            variables = summary.stats.dictionary_variables,
            bytes = summary.total_bytes(),
            rejected = summary.rejected_records,
            poisoned,
            "session closed"
        );
        Ok(summary)
    }

    /// Returns the counters so far.
    #[must_use]
    pub fn stats(&self) -> SessionSummary {
        SessionSummary {
            stats: self.writer.stats(),
            rejected_records: self.rejected_records,
            path: self.path().map(Path::to_path_buf),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the metadata written for this session.
    #[must_use]
    pub fn metadata(&self) -> SessionMetadata {
        self.metadata
    }

    /// Returns the session directory of an on-disk session.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::Disk(layout) => Some(layout.root()),
            Location::Memory(_) => None,
        }
    }

    /// Returns the streams of an in-memory session.
    #[must_use]
    pub fn memory_streams(&self) -> Option<&MemoryStreams> {
        match &self.location {
            Location::Memory(streams) => Some(streams),
            Location::Disk(_) => None,
        }
    }

    /// Returns whether the session accepts records.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Returns whether a write failure poisoned the session.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.state == State::Poisoned
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != State::Closed {
            if let Err(err) = self.close() {
                tracing::warn!(error = %err, "failed to close session on drop");
            }
        }
    }
}

fn open_sink(config: &Config, path: &Path) -> Result<Box<dyn ByteSink>> {
    let sink: Box<dyn ByteSink> = match config.backend {
        Backend::Buffered => Box::new(BufferedSink::create(path, config.write_buffer_capacity())?),
        Backend::MemoryMapped => Box::new(MmapSink::create(path, config.buffer_size)?),
    };
    Ok(sink)
}

/// A session shared between producer threads.
///
/// One lock is held across the whole append, so records from different
/// threads never interleave within the streams.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl std::fmt::Debug for SharedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSession")
            .field("session", &*self.inner.lock())
            .finish()
    }
}

impl SharedSession {
    /// Wraps `session` for shared use.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Appends one record, see [`Session::append`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::append`].
    pub fn append(&self, timestamp: i64, message: &[u8]) -> Result<()> {
        self.inner.lock().append(timestamp, message)
    }

    /// Closes the session, see [`Session::close`].
    ///
    /// Appends that wait for the lock afterwards fail with
    /// [`Error::SessionClosed`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::close`].
    pub fn close(&self) -> Result<SessionSummary> {
        self.inner.lock().close()
    }

    /// Returns the counters so far.
    #[must_use]
    pub fn stats(&self) -> SessionSummary {
        self.inner.lock().stats()
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl From<Session> for SharedSession {
    fn from(session: Session) -> Self {
        Self::new(session)
    }
}
