//! # Drover Server
//!
//! MCP (Model Context Protocol) server core. A server owns one connection:
//! it reads newline-delimited JSON-RPC 2.0 frames from a transport, runs
//! them through a middleware chain (schema validation first), routes them
//! by method through a connection lifecycle gate, and either handles them
//! itself (initialize, ping, shutdown, exit, cancellation) or delegates to
//! registered domain [`Service`]s for tools, resources, and prompts.
//!
//! ## Example
//!
//! ```no_run
//! use drover_server::ServerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ServerBuilder::new()
//!         .name("my-server")
//!         .version("1.0.0")
//!         .build()?;
//!
//!     server.run_stdio().await?;
//!     Ok(())
//! }
//! ```
//!
//! Services are registered before the server starts and looked up at
//! dispatch time by name prefix: tool and prompt names follow the
//! `<service>_<action>` convention, resource URIs use `<service>://…`.

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod routing;
pub mod schema;
pub mod server;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use lifecycle::{ConnectionPhase, ConnectionState, StateEvent};
pub use logging::{LogOutput, LoggingConfig};
pub use middleware::{MessageHandler, Middleware, MiddlewareChain};
pub use middleware::validation::{ValidationMiddleware, ValidationOptions};
pub use registry::{RegistryError, ServiceRegistry};
pub use routing::Router;
pub use schema::SchemaValidator;
pub use server::{Server, ServerBuilder, ShutdownHandle};
pub use service::Service;

// Re-export the data model for downstream convenience.
pub use drover_core::{
    ErrorKind, JsonRpcError, JsonRpcIncoming, JsonRpcOutgoing, McpError, McpResult,
    PROTOCOL_VERSION, RequestContext, Transport, TransportError,
};
