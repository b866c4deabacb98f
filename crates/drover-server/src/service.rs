//! The service capability trait.
//!
//! A [`Service`] is a registered collaborator exposing tools, resources,
//! and prompts under a unique lowercase name. The router finds the owning
//! service by prefix: tool and prompt names are `<service>_<action>`,
//! resource URIs are `<service>://…`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use drover_core::types::{
    CallToolResult, GetPromptResult, Prompt, Resource, ResourceContents, Tool,
};
use drover_core::{McpResult, RequestContext};

/// A domain service plugged into the server.
///
/// Descriptor methods are synchronous and must return immutable values;
/// the server never mutates them and snapshots them during aggregation.
/// Call operations receive the full (prefixed) tool/prompt name and the
/// full resource URI, and may block; they must respect the context's
/// cancellation token.
///
/// Errors returned from call operations are propagated unmodified into the
/// error mapper. A service may instead signal tool-level failure via
/// [`CallToolResult::error`], which reaches the model as content.
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique lowercase identifier; also the routing prefix.
    fn name(&self) -> &str;

    /// Tool descriptors exposed by this service.
    fn tools(&self) -> Vec<Tool> {
        Vec::new()
    }

    /// Resource descriptors exposed by this service.
    fn resources(&self) -> Vec<Resource> {
        Vec::new()
    }

    /// Prompt descriptors exposed by this service.
    fn prompts(&self) -> Vec<Prompt> {
        Vec::new()
    }

    /// One-shot setup, called before the first request is served.
    async fn initialize(&self, _ctx: &RequestContext) -> McpResult<()> {
        Ok(())
    }

    /// Called once during server shutdown.
    async fn shutdown(&self) {}

    /// Advisory authentication state; does not gate routing.
    fn is_authenticated(&self) -> bool {
        true
    }

    /// Invoke a tool by its full name with a JSON argument object.
    async fn call_tool(
        &self,
        ctx: &RequestContext,
        name: &str,
        arguments: Value,
    ) -> McpResult<CallToolResult>;

    /// Read a resource by its full URI.
    async fn read_resource(
        &self,
        ctx: &RequestContext,
        uri: &str,
    ) -> McpResult<Vec<ResourceContents>>;

    /// Render a prompt template by its full name.
    async fn get_prompt(
        &self,
        ctx: &RequestContext,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> McpResult<GetPromptResult>;
}
