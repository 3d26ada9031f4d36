//! Message encoding.
//!
//! Encoding a message happens in three steps:
//!
//! 1. [`tokenizer`] splits the message into static text and variable tokens
//! 2. [`variable`] picks the cheapest lossless encoding for each token
//! 3. [`message`] assembles the logtype and the ordered variable values
//!
//! ```text
//! "took 12 ms to load /etc/app.conf (0.25 load)"
//!        │                │            │
//!        ▼                ▼            ▼
//! logtype: "took \x11 ms to load \x12 (\x13 load)"
//! values:  [Integer(12), Dictionary("/etc/app.conf"), Decimal(0.25)]
//! ```

pub mod message;
pub mod tokenizer;
pub mod variable;

pub use message::{EncodedMessage, EncodedVariable, MessageEncoder};
pub use tokenizer::{TokenBounds, VariableTokens, find_next_variable, is_delimiter};
pub use variable::{VariableEncoder, VariableEncoding};
