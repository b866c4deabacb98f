//! Shared fixtures for in-crate tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use drover_core::types::{
    CallToolResult, Content, GetPromptResult, Prompt, PromptArgument, PromptMessage, Resource,
    ResourceContents, Role, Tool,
};
use drover_core::{McpError, McpResult, RequestContext};

use crate::service::Service;

/// A service named `svc` exposing one echo tool, one resource, and one
/// prompt, mirroring the shapes a real domain service would expose.
pub(crate) struct EchoService;

#[async_trait]
impl Service for EchoService {
    fn name(&self) -> &str {
        "svc"
    }

    fn tools(&self) -> Vec<Tool> {
        vec![Tool::new("svc_echo", "Echo a message back").with_schema(serde_json::json!({
            "type": "object",
            "required": ["message"],
            "properties": {"message": {"type": "string"}}
        }))]
    }

    fn resources(&self) -> Vec<Resource> {
        vec![Resource {
            uri: "svc://greeting".into(),
            name: "greeting".into(),
            description: Some("A canned greeting".into()),
            mime_type: Some("text/plain".into()),
        }]
    }

    fn prompts(&self) -> Vec<Prompt> {
        vec![Prompt {
            name: "svc_greet".into(),
            description: Some("Greet someone".into()),
            arguments: Some(vec![PromptArgument {
                name: "who".into(),
                description: None,
                required: Some(true),
            }]),
        }]
    }

    async fn call_tool(
        &self,
        _ctx: &RequestContext,
        name: &str,
        arguments: Value,
    ) -> McpResult<CallToolResult> {
        match name {
            "svc_echo" => {
                let message = arguments
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(CallToolResult::text(format!("echo: {message}")))
            }
            "svc_fail" => Err(McpError::service("tool backend unavailable")),
            other => Err(McpError::method_not_found(other)),
        }
    }

    async fn read_resource(
        &self,
        _ctx: &RequestContext,
        uri: &str,
    ) -> McpResult<Vec<ResourceContents>> {
        if uri == "svc://greeting" {
            Ok(vec![ResourceContents {
                uri: uri.to_string(),
                mime_type: Some("text/plain".into()),
                text: Some("hello from svc".into()),
            }])
        } else {
            Err(McpError::resource_not_found(uri))
        }
    }

    async fn get_prompt(
        &self,
        _ctx: &RequestContext,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        if name != "svc_greet" {
            return Err(McpError::method_not_found(name));
        }
        let who = arguments
            .and_then(|args| args.get("who").cloned())
            .unwrap_or_else(|| "world".into());
        Ok(GetPromptResult {
            description: Some("greeting".into()),
            messages: vec![PromptMessage {
                role: Role::User,
                content: Content::text(format!("Say hello to {who}")),
            }],
        })
    }
}

/// Register [`EchoService`] into a fresh registry.
pub(crate) fn registry_with_echo() -> Arc<crate::registry::ServiceRegistry> {
    let registry = crate::registry::ServiceRegistry::new();
    registry.register(Arc::new(EchoService)).unwrap();
    Arc::new(registry)
}
