//! Core type definitions for Logir.
//!
//! This module contains the fundamental types shared by the encoder and decoder:
//! - Identifier types ([`DictionaryId`], [`DictionaryKind`])
//! - Record types ([`LogRecord`])
//! - Wire-format constants ([`VariableTag`], [`EncodingWidth`], [`KeyMode`])

mod format;
mod id;
mod record;

pub use format::{EncodingWidth, FORMAT_VERSION, KeyMode, VariableTag};
pub use id::{DictionaryId, DictionaryKind};
pub use record::LogRecord;
