//! Shared harness for integration tests: an in-memory transport pair and
//! a small domain service.
#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use drover_core::types::{
    CallToolResult, Content, GetPromptResult, Prompt, PromptArgument, PromptMessage, Resource,
    ResourceContents, Role, Tool,
};
use drover_core::{McpError, McpResult, RequestContext};
use drover_server::{Server, Service};
use drover_stdio::FramedTransport;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A service named `svc` with one echo tool, one resource, one prompt.
pub struct EchoService;

#[async_trait]
impl Service for EchoService {
    fn name(&self) -> &str {
        "svc"
    }

    fn tools(&self) -> Vec<Tool> {
        vec![Tool::new("svc_echo", "Echo a message back")]
    }

    fn resources(&self) -> Vec<Resource> {
        vec![Resource {
            uri: "svc://greeting".into(),
            name: "greeting".into(),
            description: None,
            mime_type: Some("text/plain".into()),
        }]
    }

    fn prompts(&self) -> Vec<Prompt> {
        vec![Prompt {
            name: "svc_greet".into(),
            description: None,
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
            description: None,
            messages: vec![PromptMessage {
                role: Role::User,
                content: Content::text(format!("Say hello to {who}")),
            }],
        })
    }
}

/// A running server plus the client's ends of the wire.
pub struct TestClient {
    pub writer: DuplexStream,
    pub reader: BufReader<DuplexStream>,
    pub server: JoinHandle<McpResult<()>>,
}

/// Spawn `server` over an in-memory transport and hand back the client side.
pub fn connect(server: Server) -> TestClient {
    let (client_tx, server_rx) = tokio::io::duplex(64 * 1024);
    let (server_tx, client_rx) = tokio::io::duplex(64 * 1024);

    let transport = FramedTransport::new(BufReader::new(server_rx), server_tx);
    let handle = tokio::spawn(server.serve(transport));

    TestClient {
        writer: client_tx,
        reader: BufReader::new(client_rx),
        server: handle,
    }
}

impl TestClient {
    /// Send one frame.
    pub async fn send(&mut self, frame: &str) {
        self.writer.write_all(frame.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receive one response frame, parsed.
    pub async fn recv(&mut self) -> Value {
        let mut line = String::new();
        let n = tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a response")
            .expect("read from server failed");
        assert!(n > 0, "server closed the stream while a response was expected");
        serde_json::from_str(line.trim_end()).expect("server produced unparseable bytes")
    }

    /// Run the happy-path handshake (initialize + initialized).
    pub async fn handshake(&mut self) {
        self.send(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"c","version":"1"},"capabilities":{}}}"#,
        )
        .await;
        let response = self.recv().await;
        assert!(response["result"]["protocolVersion"].is_string());

        self.send(r#"{"jsonrpc":"2.0","method":"notifications/initialized","params":{}}"#)
            .await;
    }
}
