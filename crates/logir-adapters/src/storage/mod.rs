//! File-backed sinks and the session directory layout.
//!
//! - [`BufferedSink`] - Buffered writer over any [`std::io::Write`], unbounded
//! - [`MmapSink`] - Pre-allocated memory-mapped file, fixed capacity
//! - [`SessionLayout`] - File names within a session directory

mod buffered;
mod layout;
mod mmap;

pub use buffered::{BufferedSink, SyncWrite};
pub use layout::SessionLayout;
pub use mmap::MmapSink;
