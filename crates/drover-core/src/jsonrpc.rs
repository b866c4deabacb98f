//! JSON-RPC 2.0 envelope types.
//!
//! The wire format is newline-delimited JSON objects. An incoming message
//! with `method` and a non-null `id` is a request; with `method` and no id
//! (or `id: null`) it is a notification. Outgoing messages carry exactly
//! one of `result` or `error`, enforced by the constructors here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// An inbound JSON-RPC message: request or notification.
///
/// The `id` is kept as a raw [`Value`] so string, number, and null ids all
/// round-trip unchanged into the response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcIncoming {
    /// Protocol version field; must be `"2.0"`.
    pub jsonrpc: String,
    /// Request identifier. Absent or `null` for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcIncoming {
    /// Parse a raw frame into an incoming message.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, McpError> {
        serde_json::from_slice(bytes).map_err(|e| McpError::invalid_json_format(e.to_string()))
    }

    /// A message without an id (or with a JSON null id) is a notification
    /// and must not receive a response.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        match &self.id {
            None => true,
            Some(Value::Null) => true,
            Some(_) => false,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new error object.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error object with additional data.
    #[must_use]
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// An outbound JSON-RPC message.
///
/// Exactly one of `result` and `error` is set; use [`JsonRpcOutgoing::success`]
/// and [`JsonRpcOutgoing::error`] rather than constructing by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcOutgoing {
    /// Protocol version field; always `"2.0"`.
    pub jsonrpc: String,
    /// Id of the request being answered.
    pub id: Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcOutgoing {
    /// Create a success response. An empty handler result becomes JSON `null`.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    ///
    /// The protocol forbids a null id in an error reply, so callers must
    /// substitute a concrete id (the server loop uses `0`) before calling.
    #[must_use]
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Whether this message is an error response.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize to a single wire frame (terminator excluded).
    pub fn to_bytes(&self) -> Result<Vec<u8>, McpError> {
        serde_json::to_vec(self).map_err(|e| McpError::internal(e.to_string()))
    }
}
