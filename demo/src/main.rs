//! Demo MCP server: an in-memory notes service on stdio.
//!
//! Exercise it with a handshake and a tool call:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"demo-client","version":"1"},"capabilities":{}}}
//! {"jsonrpc":"2.0","method":"notifications/initialized","params":{}}
//! {"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"notes_add","arguments":{"text":"feed the herd"}}}
//! {"jsonrpc":"2.0","id":3,"method":"resources/read","params":{"uri":"notes://all"}}
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use drover_core::types::{
    CallToolResult, Content, GetPromptResult, Prompt, PromptArgument, PromptMessage, Resource,
    ResourceContents, Role, Tool,
};
use drover_core::{McpError, McpResult, RequestContext};
use drover_server::{LoggingConfig, ServerBuilder, Service};

/// Keeps notes for the lifetime of one connection.
struct NotesService {
    notes: Mutex<Vec<String>>,
}

impl NotesService {
    fn new() -> Self {
        Self {
            notes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Service for NotesService {
    fn name(&self) -> &str {
        "notes"
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool::new("notes_add", "Add a note").with_schema(serde_json::json!({
                "type": "object",
                "required": ["text"],
                "properties": {
                    "text": {"type": "string", "description": "The note text"}
                }
            })),
            Tool::new("notes_list", "List all notes"),
        ]
    }

    fn resources(&self) -> Vec<Resource> {
        vec![Resource {
            uri: "notes://all".into(),
            name: "all notes".into(),
            description: Some("Every note stored on this connection".into()),
            mime_type: Some("text/plain".into()),
        }]
    }

    fn prompts(&self) -> Vec<Prompt> {
        vec![Prompt {
            name: "notes_summarize".into(),
            description: Some("Summarize the stored notes".into()),
            arguments: Some(vec![PromptArgument {
                name: "style".into(),
                description: Some("Summary style, e.g. 'bullet' or 'prose'".into()),
                required: Some(false),
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
            "notes_add" => {
                let Some(text) = arguments.get("text").and_then(Value::as_str) else {
                    return Ok(CallToolResult::error("missing required argument 'text'"));
                };
                let mut notes = self.notes.lock();
                notes.push(text.to_string());
                Ok(CallToolResult::text(format!(
                    "added note #{}",
                    notes.len()
                )))
            }
            "notes_list" => {
                let notes = self.notes.lock();
                if notes.is_empty() {
                    Ok(CallToolResult::text("no notes yet"))
                } else {
                    Ok(CallToolResult::text(notes.join("\n")))
                }
            }
            other => Err(McpError::method_not_found(other)),
        }
    }

    async fn read_resource(
        &self,
        _ctx: &RequestContext,
        uri: &str,
    ) -> McpResult<Vec<ResourceContents>> {
        if uri != "notes://all" {
            return Err(McpError::resource_not_found(uri));
        }
        Ok(vec![ResourceContents {
            uri: uri.to_string(),
            mime_type: Some("text/plain".into()),
            text: Some(self.notes.lock().join("\n")),
        }])
    }

    async fn get_prompt(
        &self,
        _ctx: &RequestContext,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        if name != "notes_summarize" {
            return Err(McpError::method_not_found(name));
        }
        let style = arguments
            .and_then(|args| args.get("style").cloned())
            .unwrap_or_else(|| "prose".into());
        let notes = self.notes.lock().join("\n");
        Ok(GetPromptResult {
            description: Some("Summarize the stored notes".into()),
            messages: vec![PromptMessage {
                role: Role::User,
                content: Content::text(format!(
                    "Summarize these notes in {style} style:\n{notes}"
                )),
            }],
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC frames; logs go to stderr.
    LoggingConfig::stderr("info").init()?;

    let server = ServerBuilder::new()
        .name("drover-demo")
        .version(env!("CARGO_PKG_VERSION"))
        .service(NotesService::new())
        .build()?;

    server.run_stdio().await?;
    Ok(())
}
