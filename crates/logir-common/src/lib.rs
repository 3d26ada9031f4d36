//! # logir-common
//!
//! Foundation layer for Logir: record types, format constants, and utilities.
//!
//! This crate provides the fundamental building blocks used by all other
//! Logir crates. It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (LogRecord, DictionaryId, VariableTag, etc.)
//! - [`utils`] - Utility functions and helpers (hashing, errors)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use types::{DictionaryId, EncodingWidth, FORMAT_VERSION, KeyMode, LogRecord, VariableTag};
pub use utils::error::{DecodeError, Error, Result};
