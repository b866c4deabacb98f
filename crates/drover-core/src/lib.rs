//! # Drover Core
//!
//! Protocol data model shared by every drover crate: JSON-RPC 2.0 envelope
//! types, the unified [`McpError`] type, MCP descriptor types (tools,
//! resources, prompts), the request context, and the transport trait.
//!
//! This crate is deliberately free of I/O. Transports live in
//! `drover-stdio`; routing and lifecycle live in `drover-server`.

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod jsonrpc;
pub mod transport;
pub mod types;

pub use context::RequestContext;
pub use error::{ErrorContext, ErrorKind, McpError, McpResult};
pub use jsonrpc::{JSONRPC_VERSION, JsonRpcError, JsonRpcIncoming, JsonRpcOutgoing};
pub use transport::{Transport, TransportError, TransportResult};

/// Protocol version reported by the server in the `initialize` result.
///
/// Fixed at build time to match the embedded schema document.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Maximum accepted wire message size (10MB).
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;
