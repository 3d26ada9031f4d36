//! Combined-stream consumers.
//!
//! A combined stream carries dictionary content inline and refers to it by
//! digest afterwards. [`StreamAggregator`] replays such a stream into a
//! columnar session, building digest-keyed dictionaries as content arrives;
//! [`aggregate_stream`] does the same in memory, and [`decode_stream`]
//! decodes the result.

mod aggregate;

pub use aggregate::{ColumnarImage, StreamAggregator, aggregate_stream, decode_stream};
