//! Message routing and service delegation.
//!
//! The router parses the (already schema-validated) envelope, gates the
//! method against the connection lifecycle, and dispatches: core protocol
//! methods are handled in [`crate::handlers`], list methods aggregate
//! across registered services, and call methods are delegated to the
//! owning service found by name prefix or URI scheme.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use drover_core::types::{
    CallToolParams, GetPromptParams, Implementation, ListPromptsResult, ListResourcesResult,
    ListToolsResult, LogLevel, ReadResourceParams, ReadResourceResult,
};
use drover_core::{JSONRPC_VERSION, JsonRpcIncoming, JsonRpcOutgoing, McpError, McpResult, RequestContext};

use crate::lifecycle::ConnectionState;
use crate::middleware::MessageHandler;
use crate::registry::ServiceRegistry;
use crate::service::Service;

/// Per-connection router.
pub struct Router {
    pub(crate) state: Arc<ConnectionState>,
    pub(crate) services: Arc<ServiceRegistry>,
    pub(crate) server_info: Implementation,
    pub(crate) protocol_version: String,
    /// Cancelled by the `exit` handler to stop the server loop.
    pub(crate) shutdown: CancellationToken,
    /// Minimum level requested via `logging/setLevel`, if any.
    pub(crate) log_level: Mutex<Option<LogLevel>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("server_info", &self.server_info)
            .field("protocol_version", &self.protocol_version)
            .field("services", &self.services.len())
            .finish()
    }
}

impl Router {
    /// Create a router over shared connection state and services.
    #[must_use]
    pub fn new(
        state: Arc<ConnectionState>,
        services: Arc<ServiceRegistry>,
        server_info: Implementation,
        protocol_version: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state,
            services,
            server_info,
            protocol_version: protocol_version.into(),
            shutdown,
            log_level: Mutex::new(None),
        }
    }

    /// Dispatch one parsed message.
    ///
    /// Returns `Ok(None)` for notifications (no response bytes) and
    /// `Ok(Some(result))` for requests; the caller marshals the success
    /// envelope. Errors bubble up to the error mapper unchanged.
    pub async fn dispatch(
        &self,
        ctx: &RequestContext,
        message: &JsonRpcIncoming,
    ) -> McpResult<Option<Value>> {
        if message.jsonrpc != JSONRPC_VERSION {
            return Err(McpError::schema_violation(format!(
                "jsonrpc version must be \"{JSONRPC_VERSION}\""
            ))
            .with_instance_path("/jsonrpc")
            .with_method(&message.method));
        }

        let is_notification = message.is_notification();
        self.state.validate_method_sequence(&message.method)?;

        debug!(method = %message.method, notification = is_notification, "dispatching");

        let result = match message.method.as_str() {
            "initialize" => Some(self.handle_initialize(message)?),
            "notifications/initialized" => {
                self.handle_initialized()?;
                None
            }
            "shutdown" => Some(self.handle_shutdown()?),
            "exit" => {
                self.handle_exit()?;
                None
            }
            "$/cancelRequest" => {
                self.handle_cancel_request(message);
                None
            }
            "ping" => Some(self.handle_ping()),
            "logging/setLevel" => Some(self.handle_set_level(message)?),
            "completion/complete" => Some(self.handle_complete()?),

            "tools/list" => Some(self.handle_list_tools()?),
            "resources/list" => Some(self.handle_list_resources()?),
            "prompts/list" => Some(self.handle_list_prompts()?),

            "tools/call" => Some(self.handle_call_tool(ctx, message).await?),
            "resources/read" => Some(self.handle_read_resource(ctx, message).await?),
            "prompts/get" => Some(self.handle_get_prompt(ctx, message).await?),

            other => return Err(McpError::method_not_found(other)),
        };

        if is_notification {
            // Notifications never produce output, whatever the handler said.
            Ok(None)
        } else {
            Ok(Some(result.unwrap_or(Value::Null)))
        }
    }

    // ------------------------------------------------------------------
    // List aggregation
    // ------------------------------------------------------------------

    fn handle_list_tools(&self) -> McpResult<Value> {
        let tools = self
            .services
            .all()
            .iter()
            .flat_map(|s| s.tools())
            .collect();
        marshal(ListToolsResult { tools })
    }

    fn handle_list_resources(&self) -> McpResult<Value> {
        let resources = self
            .services
            .all()
            .iter()
            .flat_map(|s| s.resources())
            .collect();
        marshal(ListResourcesResult { resources })
    }

    fn handle_list_prompts(&self) -> McpResult<Value> {
        let prompts = self
            .services
            .all()
            .iter()
            .flat_map(|s| s.prompts())
            .collect();
        marshal(ListPromptsResult { prompts })
    }

    // ------------------------------------------------------------------
    // Service delegation
    // ------------------------------------------------------------------

    async fn handle_call_tool(
        &self,
        ctx: &RequestContext,
        message: &JsonRpcIncoming,
    ) -> McpResult<Value> {
        let params: CallToolParams = self.parse_params(message)?;
        let service = self.service_for_prefixed_name(&params.name)?;
        let arguments = params.arguments.unwrap_or_else(empty_object);
        let result = service.call_tool(ctx, &params.name, arguments).await?;
        marshal(result)
    }

    async fn handle_read_resource(
        &self,
        ctx: &RequestContext,
        message: &JsonRpcIncoming,
    ) -> McpResult<Value> {
        let params: ReadResourceParams = self.parse_params(message)?;
        let (scheme, _) = params
            .uri
            .split_once("://")
            .ok_or_else(|| McpError::resource_invalid(&params.uri, "missing scheme"))?;
        let service = self
            .services
            .get(scheme)
            .ok_or_else(|| McpError::resource_not_found(&params.uri))?;
        let contents = service.read_resource(ctx, &params.uri).await?;
        marshal(ReadResourceResult { contents })
    }

    async fn handle_get_prompt(
        &self,
        ctx: &RequestContext,
        message: &JsonRpcIncoming,
    ) -> McpResult<Value> {
        let params: GetPromptParams = self.parse_params(message)?;
        let service = self.service_for_prefixed_name(&params.name)?;
        let result = service.get_prompt(ctx, &params.name, params.arguments).await?;
        marshal(result)
    }

    /// Resolve the owning service of a `<service>_<action>` name.
    ///
    /// The name is split at the first underscore, so a service whose own
    /// name matches the prefix always wins over longer accidental overlaps.
    fn service_for_prefixed_name(&self, name: &str) -> McpResult<Arc<dyn Service>> {
        let Some((prefix, action)) = name.split_once('_') else {
            return Err(McpError::method_not_found(name)
                .with_detail("names follow the <service>_<action> convention"));
        };
        if prefix.is_empty() || action.is_empty() {
            return Err(McpError::method_not_found(name)
                .with_detail("names follow the <service>_<action> convention"));
        }
        self.services.get(prefix).ok_or_else(|| {
            McpError::method_not_found(name).with_detail(format!("no service '{prefix}'"))
        })
    }

    pub(crate) fn parse_params<T>(&self, message: &JsonRpcIncoming) -> McpResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let params = message.params.clone().unwrap_or_else(empty_object);
        serde_json::from_value(params).map_err(|e| {
            McpError::invalid_params(e.to_string()).with_method(&message.method)
        })
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

pub(crate) fn marshal<T: serde::Serialize>(value: T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::internal(e.to_string()))
}

/// Build the terminal [`MessageHandler`] around a router.
///
/// Parses raw frame bytes, dispatches with the configured request timeout,
/// and marshals the success envelope. Notifications yield no bytes.
pub fn terminal_handler(router: Arc<Router>, request_timeout: Duration) -> MessageHandler {
    Arc::new(move |ctx, bytes: Bytes| {
        let router = Arc::clone(&router);
        Box::pin(async move {
            let message = JsonRpcIncoming::from_slice(&bytes)?;
            let id = message.id.clone();

            let dispatched =
                tokio::time::timeout(request_timeout, router.dispatch(&ctx, &message))
                    .await
                    .map_err(|_| {
                        McpError::timeout(format!(
                            "request '{}' exceeded {:?}",
                            message.method, request_timeout
                        ))
                        .with_method(&message.method)
                    })??;

            match dispatched {
                None => Ok(None),
                Some(result) => {
                    let envelope = JsonRpcOutgoing::success(id.unwrap_or(Value::Null), result);
                    Ok(Some(Bytes::from(envelope.to_bytes()?)))
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::StateEvent;
    use crate::test_support::registry_with_echo;
    use drover_core::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn router() -> Router {
        Router::new(
            Arc::new(ConnectionState::new()),
            registry_with_echo(),
            Implementation {
                name: "drover-test".into(),
                version: "0.0.0".into(),
            },
            drover_core::PROTOCOL_VERSION,
            CancellationToken::new(),
        )
    }

    fn initialized_router() -> Router {
        let r = router();
        r.state.transition(StateEvent::InitializeAccepted).unwrap();
        r.state.transition(StateEvent::InitializedReceived).unwrap();
        r
    }

    fn request(method: &str, params: Value) -> JsonRpcIncoming {
        JsonRpcIncoming {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: method.into(),
            params: Some(params),
        }
    }

    #[tokio::test]
    async fn wrong_version_is_rejected() {
        let r = initialized_router();
        let mut msg = request("ping", json!({}));
        msg.jsonrpc = "1.0".into();
        let err = r.dispatch(&RequestContext::new(), &msg).await.unwrap_err();
        assert_eq!(err.to_error_object().code, -32600);
    }

    #[tokio::test]
    async fn sequence_gate_runs_before_dispatch() {
        let r = router();
        let err = r
            .dispatch(&RequestContext::new(), &request("tools/list", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequestSequence);
        // The phase did not change.
        assert_eq!(
            r.state.phase(),
            crate::lifecycle::ConnectionPhase::Uninitialized
        );
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let r = initialized_router();
        let err = r
            .dispatch(&RequestContext::new(), &request("does_not_exist", json!({})))
            .await
            .unwrap_err();
        let obj = err.to_error_object();
        assert_eq!(obj.code, -32601);
        assert_eq!(obj.data.unwrap()["method"], "does_not_exist");
    }

    #[tokio::test]
    async fn list_aggregation_covers_all_families() {
        let r = initialized_router();
        let ctx = RequestContext::new();

        let tools = r
            .dispatch(&ctx, &request("tools/list", json!({})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tools["tools"][0]["name"], "svc_echo");

        let resources = r
            .dispatch(&ctx, &request("resources/list", json!({})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resources["resources"][0]["uri"], "svc://greeting");

        let prompts = r
            .dispatch(&ctx, &request("prompts/list", json!({})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prompts["prompts"][0]["name"], "svc_greet");
    }

    #[tokio::test]
    async fn tool_call_is_delegated_by_prefix() {
        let r = initialized_router();
        let result = r
            .dispatch(
                &RequestContext::new(),
                &request(
                    "tools/call",
                    json!({"name": "svc_echo", "arguments": {"message": "hi"}}),
                ),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["content"][0]["text"], "echo: hi");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn tool_call_with_unknown_prefix_is_method_not_found() {
        let r = initialized_router();
        let err = r
            .dispatch(
                &RequestContext::new(),
                &request("tools/call", json!({"name": "ghost_echo", "arguments": {}})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MethodNotFound);
    }

    #[tokio::test]
    async fn tool_call_with_malformed_name_is_method_not_found() {
        let r = initialized_router();
        for name in ["noprefix", "_leading", "trailing_"] {
            let err = r
                .dispatch(
                    &RequestContext::new(),
                    &request("tools/call", json!({"name": name, "arguments": {}})),
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::MethodNotFound, "name {name:?}");
        }
    }

    #[tokio::test]
    async fn resource_read_routes_by_scheme() {
        let r = initialized_router();
        let result = r
            .dispatch(
                &RequestContext::new(),
                &request("resources/read", json!({"uri": "svc://greeting"})),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["contents"][0]["text"], "hello from svc");
    }

    #[tokio::test]
    async fn schemeless_uri_is_resource_invalid() {
        let r = initialized_router();
        let err = r
            .dispatch(
                &RequestContext::new(),
                &request("resources/read", json!({"uri": "no-scheme-here"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResourceInvalid);
    }

    #[tokio::test]
    async fn unknown_scheme_is_resource_not_found() {
        let r = initialized_router();
        let err = r
            .dispatch(
                &RequestContext::new(),
                &request("resources/read", json!({"uri": "ghost://thing"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResourceNotFound);
    }

    #[tokio::test]
    async fn prompt_get_is_delegated() {
        let r = initialized_router();
        let result = r
            .dispatch(
                &RequestContext::new(),
                &request(
                    "prompts/get",
                    json!({"name": "svc_greet", "arguments": {"who": "drover"}}),
                ),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["messages"][0]["content"]["text"], "Say hello to drover");
    }

    #[tokio::test]
    async fn service_errors_propagate_unchanged() {
        let r = initialized_router();
        let err = r
            .dispatch(
                &RequestContext::new(),
                &request("tools/call", json!({"name": "svc_fail", "arguments": {}})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Service);
    }

    #[tokio::test]
    async fn notifications_produce_no_result() {
        let r = initialized_router();
        let msg = JsonRpcIncoming {
            jsonrpc: "2.0".into(),
            id: None,
            method: "$/cancelRequest".into(),
            params: Some(json!({"id": 7})),
        };
        let out = r.dispatch(&RequestContext::new(), &msg).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn terminal_handler_marshals_success_envelope() {
        let r = Arc::new(initialized_router());
        let handler = terminal_handler(r, Duration::from_secs(5));
        let out = handler(
            RequestContext::new(),
            Bytes::from_static(br#"{"jsonrpc":"2.0","id":2,"method":"ping","params":{}}"#),
        )
        .await
        .unwrap()
        .unwrap();
        let wire: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(wire, json!({"jsonrpc":"2.0","id":2,"result":{}}));
    }

    #[tokio::test]
    async fn terminal_handler_suppresses_notification_output() {
        let r = router();
        r.state.transition(StateEvent::InitializeAccepted).unwrap();
        let handler = terminal_handler(Arc::new(r), Duration::from_secs(5));
        let out = handler(
            RequestContext::new(),
            Bytes::from_static(
                br#"{"jsonrpc":"2.0","method":"notifications/initialized","params":{}}"#,
            ),
        )
        .await
        .unwrap();
        assert!(out.is_none());
    }
}
