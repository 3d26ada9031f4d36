//! # logir-core
//!
//! Core layer for Logir: the algorithms that turn a log message into a
//! logtype plus encoded variables, and the binary IR they are written to.
//!
//! This crate performs no file I/O of its own. Writers append to the
//! [`storage::ByteSink`] trait, whose file-backed implementations live in
//! `logir-adapters`. It depends only on `logir-common`.
//!
//! ## Modules
//!
//! - [`encoding`] - Tokenizer, variable encoders, and message encoding
//! - [`dictionary`] - Compression and decompression dictionaries
//! - [`storage`] - Byte sink contract and in-memory sink
//! - [`ir`] - Columnar and combined-stream writers, and the decoder

pub mod dictionary;
pub mod encoding;
pub mod ir;
pub mod storage;

// Re-export commonly used types
pub use dictionary::{
    CompressionDictionary, DecompressionDictionary, DigestDictionary, PendingEntries,
};
pub use encoding::{EncodedMessage, EncodedVariable, MessageEncoder, VariableEncoder};
pub use ir::{
    ColumnSlices, ColumnarSinks, ColumnarWriter, Columns, Decoder, IrWriter, StreamReader,
    StreamWriter, WriterStats,
};
pub use storage::{ByteSink, MemorySink};
