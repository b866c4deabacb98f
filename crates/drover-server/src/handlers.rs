//! Core protocol method handlers.
//!
//! These run for methods the server answers itself: the initialize
//! handshake, liveness, shutdown sequencing, cancellation, log level
//! control, and completion. Everything else is delegated to services by
//! the router.

use serde_json::Value;
use tracing::{info, warn};

use drover_core::types::{
    CompleteResult, FeatureCapability, InitializeParams, InitializeResult, ServerCapabilities,
    SetLevelParams,
};
use drover_core::{JsonRpcIncoming, McpResult};

use crate::lifecycle::StateEvent;
use crate::routing::{Router, marshal};

impl Router {
    /// `initialize`: store client info, compose capabilities, and move the
    /// connection into `Initializing`.
    ///
    /// Clients that omit `protocolVersion` are tolerated and served the
    /// server's version.
    pub(crate) fn handle_initialize(&self, message: &JsonRpcIncoming) -> McpResult<Value> {
        let params: InitializeParams = self.parse_params(message)?;

        if params.protocol_version.is_none() {
            warn!(
                served = %self.protocol_version,
                "client omitted protocolVersion in initialize"
            );
        }
        if let Some(info) = &params.client_info {
            info!(client = %info.name, client_version = %info.version, "initialize received");
        }

        self.state
            .set_client(params.client_info, params.capabilities)?;
        let capabilities = self.compose_capabilities();
        self.state.transition(StateEvent::InitializeAccepted)?;

        marshal(InitializeResult {
            protocol_version: self.protocol_version.clone(),
            server_info: self.server_info.clone(),
            capabilities,
        })
    }

    /// `notifications/initialized`: handshake complete.
    pub(crate) fn handle_initialized(&self) -> McpResult<()> {
        self.state.transition(StateEvent::InitializedReceived)?;
        info!("connection initialized");
        Ok(())
    }

    /// `shutdown`: move to `ShuttingDown` and answer JSON null.
    pub(crate) fn handle_shutdown(&self) -> McpResult<Value> {
        self.state.transition(StateEvent::ShutdownRequested)?;
        info!("shutdown requested");
        Ok(Value::Null)
    }

    /// `exit`: move to `Shutdown` and signal the server loop to stop.
    pub(crate) fn handle_exit(&self) -> McpResult<()> {
        self.state.transition(StateEvent::ExitReceived)?;
        info!("exit received; stopping server loop");
        self.shutdown.cancel();
        Ok(())
    }

    /// `$/cancelRequest`: logged only. Requests are processed strictly in
    /// arrival order by the single driver task, so by the time this
    /// notification is read there is no concurrent in-flight request left
    /// to cancel; real cancellation stays best-effort.
    pub(crate) fn handle_cancel_request(&self, message: &JsonRpcIncoming) {
        match self.parse_params::<drover_core::types::CancelParams>(message) {
            Ok(params) => info!(
                cancelled_id = %params.id,
                reason = params.reason.as_deref().unwrap_or("unspecified"),
                "cancel requested"
            ),
            Err(e) => warn!(error = %e, "malformed $/cancelRequest ignored"),
        }
    }

    /// `ping`: always `{}`.
    pub(crate) fn handle_ping(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// `logging/setLevel`: remember the requested level and answer `{}`.
    pub(crate) fn handle_set_level(&self, message: &JsonRpcIncoming) -> McpResult<Value> {
        let params: SetLevelParams = self.parse_params(message)?;
        info!(level = ?params.level, "log level set by client");
        *self.log_level.lock() = Some(params.level);
        Ok(Value::Object(serde_json::Map::new()))
    }

    /// `completion/complete`: no service-backed completions; answer empty.
    pub(crate) fn handle_complete(&self) -> McpResult<Value> {
        marshal(CompleteResult::empty())
    }

    /// Union of the registered services' advertised features.
    ///
    /// A feature section is present when at least one service exposes a
    /// descriptor of that family. Logging is always advertised since the
    /// server handles `logging/setLevel` itself.
    pub(crate) fn compose_capabilities(&self) -> ServerCapabilities {
        let services = self.services.all();
        let has_tools = services.iter().any(|s| !s.tools().is_empty());
        let has_resources = services.iter().any(|s| !s.resources().is_empty());
        let has_prompts = services.iter().any(|s| !s.prompts().is_empty());

        ServerCapabilities {
            tools: has_tools.then(FeatureCapability::default),
            resources: has_resources.then(FeatureCapability::default),
            prompts: has_prompts.then(FeatureCapability::default),
            logging: Some(Value::Object(serde_json::Map::new())),
        }
    }
}
