//! # logir-engine
//!
//! The main entry point for Logir: session lifecycle, configuration, and
//! reading sessions back.
//!
//! ## Modules
//!
//! - [`config`] - Configuration options
//! - [`metadata`] - The `session.meta` file
//! - [`session`] - Session and shared-session management
//! - [`reader`] - Decoding closed sessions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod metadata;
pub mod reader;
pub mod session;

pub use config::{Backend, Config, IrFormat};
pub use metadata::SessionMetadata;
pub use reader::SessionReader;
pub use session::{MemoryStreams, Session, SessionSummary, SharedSession};
