//! # Drover STDIO Transport
//!
//! Newline-delimited JSON framing over any async reader/writer pair, plus
//! the [`StdioTransport`] convenience constructor for process stdin/stdout.
//!
//! STDIO is the normative MCP transport: stdin carries inbound frames,
//! stdout carries outbound frames, and EOF on stdin is the close signal.
//! Log output must go to stderr; stdout is reserved for protocol frames.

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

mod transport;

pub use transport::{FramedTransport, StdioTransport};
