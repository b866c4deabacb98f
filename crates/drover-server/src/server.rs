//! The server: builder, ownership of one connection, and the
//! read-dispatch-write loop.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use drover_core::types::Implementation;
use drover_core::{
    JsonRpcOutgoing, McpError, McpResult, RequestContext, Transport, TransportError,
};
use drover_stdio::StdioTransport;

use crate::config::ServerConfig;
use crate::lifecycle::{ConnectionState, StateEvent};
use crate::middleware::validation::ValidationMiddleware;
use crate::middleware::{MessageHandler, MiddlewareChain};
use crate::registry::ServiceRegistry;
use crate::routing::{Router, terminal_handler};
use crate::schema::SchemaValidator;
use crate::service::Service;

/// Handle for stopping a running server from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Request shutdown; the server loop exits at its next suspension point.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Builder for [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    config: ServerConfig,
    services: Vec<Arc<dyn Service>>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("services", &self.services.len())
            .finish()
    }
}

impl ServerBuilder {
    /// Create a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the server version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a domain service.
    #[must_use]
    pub fn service(mut self, service: impl Service + 'static) -> Self {
        self.services.push(Arc::new(service));
        self
    }

    /// Register an already-shared domain service.
    #[must_use]
    pub fn service_arc(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    /// Build the server: register services and compile the MCP schema.
    pub fn build(self) -> McpResult<Server> {
        let registry = ServiceRegistry::new();
        for service in self.services {
            let name = service.name().to_string();
            registry
                .register(service)
                .map_err(|e| McpError::internal(e.to_string()).with_detail(name))?;
        }

        let validator = SchemaValidator::new();
        match &self.config.schema_path {
            Some(path) => {
                let document = std::fs::read_to_string(path).map_err(|e| {
                    McpError::new(
                        drover_core::ErrorKind::SchemaLoad,
                        format!("schema override {}: {e}", path.display()),
                    )
                })?;
                validator.initialize_with(&document)?;
            }
            None => validator.initialize()?,
        }

        Ok(Server {
            config: self.config,
            registry: Arc::new(registry),
            validator: Arc::new(validator),
            state: Arc::new(ConnectionState::new()),
            shutdown: CancellationToken::new(),
        })
    }
}

/// An MCP server bound to one connection.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    registry: Arc<ServiceRegistry>,
    validator: Arc<SchemaValidator>,
    state: Arc<ConnectionState>,
    shutdown: CancellationToken,
}

impl Server {
    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The connection state machine.
    #[must_use]
    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    /// Handle for stopping the server from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    /// Run on process stdin/stdout.
    pub async fn run_stdio(self) -> McpResult<()> {
        info!(name = %self.config.name, version = %self.config.version, "starting stdio server");
        self.serve(StdioTransport::stdio()).await
    }

    /// Run the connection over an arbitrary transport.
    ///
    /// Initializes every registered service, drives the read-dispatch-write
    /// loop until the transport closes or `exit` arrives, then runs the
    /// service shutdown hooks and records the transport closure in the
    /// state machine.
    pub async fn serve<T: Transport>(self, transport: T) -> McpResult<()> {
        let Self {
            config,
            registry,
            validator,
            state,
            shutdown,
        } = self;

        let init_ctx = RequestContext::child_of(&shutdown);
        for service in registry.all() {
            service.initialize(&init_ctx).await?;
            if !service.is_authenticated() {
                // Advisory only; authentication never gates routing.
                warn!(service = service.name(), "service reports unauthenticated");
            }
        }

        let router = Arc::new(Router::new(
            Arc::clone(&state),
            Arc::clone(&registry),
            Implementation {
                name: config.name.clone(),
                version: config.version.clone(),
            },
            config.protocol_version.clone(),
            shutdown.clone(),
        ));
        let handler = MiddlewareChain::new()
            .push(ValidationMiddleware::new(
                Arc::clone(&validator),
                config.validation.clone(),
            ))
            .build(terminal_handler(router, config.request_timeout));

        run_loop(&transport, &handler, &shutdown, &config).await;

        // The connection is over whichever way the loop ended.
        let _ = state.transition(StateEvent::TransportClosed);
        for service in registry.all() {
            service.shutdown().await;
        }
        transport.close().await;

        info!("connection finished");
        Ok(())
    }
}

/// One read-dispatch-write iteration per inbound frame.
async fn run_loop<T: Transport>(
    transport: &T,
    handler: &MessageHandler,
    shutdown: &CancellationToken,
    config: &ServerConfig,
) {
    loop {
        let frame = match transport.read(shutdown).await {
            Ok(frame) => frame,
            Err(e) if e.is_terminal() => {
                debug!(reason = %e, "transport closed; leaving loop");
                break;
            }
            Err(e) => {
                warn!(error = %e, "transport read failed; continuing");
                continue;
            }
        };

        // Best-effort envelope peek for logging and error-reply ids.
        let (method, id) = peek_envelope(&frame);
        debug!(
            method = method.as_deref().unwrap_or("<none>"),
            id = %id.clone().unwrap_or(serde_json::Value::Null),
            len = frame.len(),
            "frame received"
        );

        if frame.len() > config.max_message_size {
            let err = McpError::schema_violation(format!(
                "message exceeds maximum size of {} bytes",
                config.max_message_size
            ));
            if write_error(transport, shutdown, id, &err).await.is_err() {
                break;
            }
            continue;
        }

        let ctx = RequestContext::child_of(shutdown).with_deadline(config.request_timeout);
        match handler(ctx, frame).await {
            Ok(Some(response)) => {
                if let Err(e) = write_frame(transport, shutdown, &response).await {
                    warn!(error = %e, "transport write failed; leaving loop");
                    break;
                }
            }
            Ok(None) => {}
            Err(err) if err.is_terminal() => {
                debug!(reason = %err, "handler reported terminal error; leaving loop");
                break;
            }
            Err(err) => {
                warn!(
                    method = method.as_deref().unwrap_or("<none>"),
                    kind = %err.kind,
                    error = %err,
                    "request failed"
                );
                if write_error(transport, shutdown, id, &err).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Extract `method` and `id` from raw bytes without failing.
fn peek_envelope(bytes: &[u8]) -> (Option<String>, Option<Value>) {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => {
            let method = value
                .get("method")
                .and_then(Value::as_str)
                .map(str::to_string);
            let id = value.get("id").cloned();
            (method, id)
        }
        Err(_) => (None, None),
    }
}

async fn write_frame<T: Transport>(
    transport: &T,
    cancel: &CancellationToken,
    bytes: &[u8],
) -> Result<(), TransportError> {
    transport.write(bytes, cancel).await
}

/// Map and write an error response.
///
/// The protocol forbids a null id in an error reply; a missing or null
/// request id is replaced with the literal `0`. Returns `Err` when the
/// loop must terminate (marshal failure or write failure).
async fn write_error<T: Transport>(
    transport: &T,
    cancel: &CancellationToken,
    id: Option<Value>,
    err: &McpError,
) -> Result<(), ()> {
    let response_id = match id {
        Some(v) if !v.is_null() => v,
        _ => Value::from(0),
    };

    let envelope = JsonRpcOutgoing::error(response_id, err.to_error_object());
    let bytes: Bytes = match envelope.to_bytes() {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            error!(error = %e, "failed to marshal error response; leaving loop");
            return Err(());
        }
    };

    write_frame(transport, cancel, &bytes).await.map_err(|e| {
        warn!(error = %e, "transport write failed; leaving loop");
    })
}
