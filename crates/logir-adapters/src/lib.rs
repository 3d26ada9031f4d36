//! # logir-adapters
//!
//! Adapters layer for Logir: file-backed byte sinks, the on-disk session
//! layout, and conversion of combined streams into columnar sessions.
//!
//! ## Modules
//!
//! - [`storage`] - Buffered and memory-mapped sinks, session directory layout
//! - [`stream`] - Combined-stream aggregation and decoding

pub mod storage;
pub mod stream;
