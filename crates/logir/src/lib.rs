//! # Logir
//!
//! Compresses log messages into a dictionary-encoded intermediate
//! representation.
//!
//! Every message is split into a *logtype*, its static text with one
//! placeholder byte per variable, and the variables themselves. Integers and
//! short decimals are stored inline; every other variable, and every
//! logtype, goes to a dictionary and is stored once.
//!
//! Start with [`Session`]: open one from a [`Config`], append records, close
//! it, and read it back with [`SessionReader`].
//!
//! ## Layouts
//!
//! | Format | Streams | Notes |
//! | ------ | ------- | ----- |
//! | [`IrFormat::Columnar`] | 2 dictionaries, 3 columns | default |
//! | [`IrFormat::Stream`] | `ir.stream` | dictionary content inline, referenced by digest |
//!
//! ## Quick Start
//!
//! ```rust
//! use logir::{Config, Session, SessionReader};
//!
//! let dir = tempfile::tempdir()?;
//! let mut session = Session::open(Config::persistent(dir.path()))?;
//! session.append(1_700_000_000_000, b"user=42 path=/a/b id=ff")?;
//! session.append(1_700_000_000_001, b"user=43 path=/a/b id=fe")?;
//! let summary = session.close()?;
//! assert_eq!(summary.stats.logtypes, 1);
//!
//! let reader = SessionReader::open(dir.path())?;
//! for record in reader.records()? {
//!     let record = record?;
//!     println!("{} {}", record.timestamp, record.message_lossy());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export the session API
pub use logir_engine::{
    Backend, Config, IrFormat, MemoryStreams, Session, SessionMetadata, SessionReader, SessionSummary,
    SharedSession,
};

// Re-export core types
pub use logir_common::types::{DictionaryId, DictionaryKind, EncodingWidth, KeyMode, LogRecord};
pub use logir_common::utils::error::{DecodeError, Error, Result};

// Encoding building blocks, for callers that manage their own streams
pub use logir_core::{
    EncodedMessage, EncodedVariable, MessageEncoder, VariableEncoder,
    ir::{Decoder, IrWriter, WriterStats},
};

/// Combined-stream tools.
pub mod stream {
    pub use logir_adapters::stream::{ColumnarImage, StreamAggregator, aggregate_stream, decode_stream};
}
