//! Unified error handling.
//!
//! One [`McpError`] sum type covers every failure the server can surface:
//! transport faults, schema violations, lifecycle sequence errors, routing
//! misses, and service failures. The JSON-RPC error mapper lives here too,
//! so the wire representation of every kind is decided in a single place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::jsonrpc::JsonRpcError;

/// Result type alias for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// Start of the implementation-defined JSON-RPC error code range.
pub const IMPL_CODE_MIN: i32 = -32099;
/// End of the implementation-defined JSON-RPC error code range.
pub const IMPL_CODE_MAX: i32 = -32000;

/// Code assigned to lifecycle sequence violations.
pub const CODE_REQUEST_SEQUENCE: i32 = -32001;
/// Code assigned to resource lookup failures.
pub const CODE_RESOURCE_NOT_FOUND: i32 = -32011;
/// Code assigned to malformed resource URIs.
pub const CODE_RESOURCE_INVALID: i32 = -32012;

/// Unified error type for all drover operations.
///
/// Errors are classified by [`ErrorKind`] and carry an optional boxed
/// [`ErrorContext`] with the fields the error mapper folds into the
/// `error.data` object. An explicit `code` in the implementation-defined
/// range (set by services or by the resource constructors) passes through
/// the mapper unchanged.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct McpError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message. Logged; only canonical text goes on the wire.
    pub message: String,
    /// Explicit JSON-RPC code, if the error carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Additional context, boxed to keep the error small.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Box<ErrorContext>>,
}

/// Contextual fields attached to an error, surfaced as `error.data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Method that was being handled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Connection phase at the time of the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// JSON pointer into the offending instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_path: Option<String>,
    /// JSON pointer into the schema that rejected the instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
    /// Free-form detail for logs and `error.data.detail`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Hint for the client on how to recover.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Error classification for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport reached end of stream or was closed.
    TransportClosed,
    /// Transport operation timed out.
    TransportTimeout,
    /// Underlying I/O failure.
    TransportIo,
    /// Operation cancelled via the request context.
    Cancelled,
    /// Schema document could not be loaded or parsed.
    SchemaLoad,
    /// Schema document loaded but failed to compile.
    SchemaCompile,
    /// Validator used before `initialize()`.
    SchemaNotInitialized,
    /// Message bytes are not parseable JSON.
    InvalidJsonFormat,
    /// Message parsed but does not match the schema.
    SchemaViolation,
    /// Method not allowed in the current connection phase.
    RequestSequence,
    /// Unknown method or unknown service prefix.
    MethodNotFound,
    /// Handler-detected bad arguments.
    InvalidParams,
    /// Resource URI did not resolve.
    ResourceNotFound,
    /// Resource URI is malformed (e.g. missing scheme).
    ResourceInvalid,
    /// Error propagated from a registered service.
    Service,
    /// Handler exceeded its deadline.
    Timeout,
    /// Anything else.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TransportClosed => "transport_closed",
            Self::TransportTimeout => "transport_timeout",
            Self::TransportIo => "transport_io",
            Self::Cancelled => "cancelled",
            Self::SchemaLoad => "schema_load",
            Self::SchemaCompile => "schema_compile",
            Self::SchemaNotInitialized => "schema_not_initialized",
            Self::InvalidJsonFormat => "invalid_json_format",
            Self::SchemaViolation => "schema_violation",
            Self::RequestSequence => "request_sequence",
            Self::MethodNotFound => "method_not_found",
            Self::InvalidParams => "invalid_params",
            Self::ResourceNotFound => "resource_not_found",
            Self::ResourceInvalid => "resource_invalid",
            Self::Service => "service",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl McpError {
    /// Create a new error with kind and message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            context: None,
        }
    }

    /// Bytes were not parseable JSON.
    #[must_use]
    pub fn invalid_json_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidJsonFormat, message).with_instance_path("")
    }

    /// Message failed schema validation.
    #[must_use]
    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaViolation, message)
    }

    /// Method not allowed in the current connection phase.
    #[must_use]
    pub fn request_sequence(method: impl Into<String>, state: impl Into<String>) -> Self {
        let method = method.into();
        let state = state.into();
        Self::new(
            ErrorKind::RequestSequence,
            format!("method '{method}' not allowed in state '{state}'"),
        )
        .with_code(CODE_REQUEST_SEQUENCE)
        .with_method(method)
        .with_state(state)
    }

    /// Unknown method or unknown service prefix.
    #[must_use]
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(
            ErrorKind::MethodNotFound,
            format!("method not found: {method}"),
        )
        .with_method(method)
    }

    /// Handler-detected bad arguments.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    /// Resource URI did not resolve to a registered service.
    #[must_use]
    pub fn resource_not_found(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self::new(
            ErrorKind::ResourceNotFound,
            format!("resource not found: {uri}"),
        )
        .with_code(CODE_RESOURCE_NOT_FOUND)
        .with_detail(uri)
    }

    /// Resource URI is malformed.
    #[must_use]
    pub fn resource_invalid(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        let uri = uri.into();
        Self::new(
            ErrorKind::ResourceInvalid,
            format!("invalid resource URI '{}': {}", uri, reason.into()),
        )
        .with_code(CODE_RESOURCE_INVALID)
        .with_detail(uri)
    }

    /// Error propagated from a registered service.
    #[must_use]
    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Service, message)
    }

    /// Operation cancelled.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Handler exceeded its deadline.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach an explicit JSON-RPC code.
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach the method being handled.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.context_mut().method = Some(method.into());
        self
    }

    /// Attach the connection phase.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.context_mut().state = Some(state.into());
        self
    }

    /// Attach the instance path of a validation failure.
    #[must_use]
    pub fn with_instance_path(mut self, path: impl Into<String>) -> Self {
        self.context_mut().instance_path = Some(path.into());
        self
    }

    /// Attach the schema path of a validation failure.
    #[must_use]
    pub fn with_schema_path(mut self, path: impl Into<String>) -> Self {
        self.context_mut().schema_path = Some(path.into());
        self
    }

    /// Attach free-form detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.context_mut().detail = Some(detail.into());
        self
    }

    /// Attach a recovery hint.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().suggestion = Some(suggestion.into());
        self
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        self.context.get_or_insert_with(Default::default)
    }

    /// Instance path of a validation failure, if recorded.
    #[must_use]
    pub fn instance_path(&self) -> Option<&str> {
        self.context.as_deref().and_then(|c| c.instance_path.as_deref())
    }

    /// Whether this error should terminate the connection loop.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::TransportClosed | ErrorKind::Cancelled
        )
    }

    /// Map this error to the canonical JSON-RPC error object.
    ///
    /// Implements the fixed decision order of the error mapper; `data`
    /// carries whatever context the error recorded, never stack traces.
    #[must_use]
    pub fn to_error_object(&self) -> JsonRpcError {
        let (code, message) = self.wire_code_and_message();
        let data = self.wire_data();
        match data {
            Some(data) => JsonRpcError::with_data(code, message, data),
            None => JsonRpcError::new(code, message),
        }
    }

    fn wire_code_and_message(&self) -> (i32, &'static str) {
        const INTERNAL_MSG: &str = "An unexpected internal server error occurred.";
        match self.kind {
            ErrorKind::InvalidJsonFormat => (-32700, "Parse error."),
            ErrorKind::SchemaViolation => {
                let in_params = self
                    .instance_path()
                    .is_some_and(|p| p.starts_with("/params") || p.starts_with("params"));
                if in_params {
                    (-32602, "Invalid params.")
                } else {
                    (-32600, "Invalid Request.")
                }
            }
            ErrorKind::RequestSequence => (CODE_REQUEST_SEQUENCE, "Invalid message sequence."),
            ErrorKind::MethodNotFound => (-32601, "Method not found."),
            ErrorKind::InvalidParams => (-32602, "Invalid params."),
            _ => match self.code {
                Some(code) if (IMPL_CODE_MIN..=IMPL_CODE_MAX).contains(&code) => {
                    (code, self.wire_message_for_impl_code())
                }
                _ => (-32603, INTERNAL_MSG),
            },
        }
    }

    fn wire_message_for_impl_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::ResourceNotFound => "Resource not found.",
            ErrorKind::ResourceInvalid => "Invalid resource URI.",
            _ => "Server error.",
        }
    }

    fn wire_data(&self) -> Option<Value> {
        let mut data = Map::new();
        if let Some(ctx) = self.context.as_deref() {
            if let Some(method) = &ctx.method {
                data.insert("method".into(), Value::String(method.clone()));
            }
            if let Some(state) = &ctx.state {
                data.insert("state".into(), Value::String(state.clone()));
            }
            if let Some(path) = &ctx.instance_path {
                data.insert("validationPath".into(), Value::String(path.clone()));
            }
            if let Some(path) = &ctx.schema_path {
                data.insert("schemaPath".into(), Value::String(path.clone()));
            }
            if let Some(detail) = &ctx.detail {
                data.insert("detail".into(), Value::String(detail.clone()));
            }
            if let Some(suggestion) = &ctx.suggestion {
                data.insert("suggestion".into(), Value::String(suggestion.clone()));
            }
        }
        // Kinds whose canonical wire message is fixed text still explain
        // themselves through data.detail.
        let self_describing = matches!(
            self.kind,
            ErrorKind::RequestSequence
                | ErrorKind::InvalidParams
                | ErrorKind::Service
                | ErrorKind::ResourceNotFound
                | ErrorKind::ResourceInvalid
        );
        if self_describing && !data.contains_key("detail") {
            data.insert("detail".into(), Value::String(self.message.clone()));
        }
        if data.is_empty() {
            None
        } else {
            Some(Value::Object(data))
        }
    }
}

impl From<crate::transport::TransportError> for McpError {
    fn from(err: crate::transport::TransportError) -> Self {
        use crate::transport::TransportError;
        match err {
            TransportError::Closed => {
                Self::new(ErrorKind::TransportClosed, "connection closed")
            }
            TransportError::Timeout => {
                Self::new(ErrorKind::TransportTimeout, "transport operation timed out")
            }
            TransportError::Cancelled => Self::cancelled("transport operation cancelled"),
            TransportError::Io(message) => Self::new(ErrorKind::TransportIo, message),
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_json_format(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_error_maps_to_32700() {
        let obj = McpError::invalid_json_format("unexpected token").to_error_object();
        assert_eq!(obj.code, -32700);
        assert_eq!(obj.message, "Parse error.");
    }

    #[test]
    fn params_violation_maps_to_invalid_params() {
        let obj = McpError::schema_violation("missing field")
            .with_instance_path("/params/name")
            .to_error_object();
        assert_eq!(obj.code, -32602);
        assert_eq!(obj.message, "Invalid params.");
    }

    #[test]
    fn envelope_violation_maps_to_invalid_request() {
        let obj = McpError::schema_violation("bad envelope")
            .with_instance_path("/jsonrpc")
            .to_error_object();
        assert_eq!(obj.code, -32600);
        assert_eq!(obj.message, "Invalid Request.");
    }

    #[test]
    fn sequence_error_carries_state_and_method() {
        let obj = McpError::request_sequence("tools/list", "uninitialized").to_error_object();
        assert_eq!(obj.code, -32001);
        assert_eq!(obj.message, "Invalid message sequence.");
        let data = obj.data.unwrap();
        assert_eq!(data["state"], "uninitialized");
        assert_eq!(data["method"], "tools/list");
    }

    #[test]
    fn method_not_found_carries_method() {
        let obj = McpError::method_not_found("does_not_exist").to_error_object();
        assert_eq!(obj.code, -32601);
        assert_eq!(obj.data.unwrap()["method"], "does_not_exist");
    }

    #[test]
    fn impl_range_code_passes_through() {
        let obj = McpError::resource_not_found("svc://missing").to_error_object();
        assert_eq!(obj.code, CODE_RESOURCE_NOT_FOUND);
    }

    #[test]
    fn out_of_range_code_falls_back_to_internal() {
        let obj = McpError::service("backend exploded")
            .with_code(-42)
            .to_error_object();
        assert_eq!(obj.code, -32603);
        assert_eq!(obj.message, "An unexpected internal server error occurred.");
    }

    #[test]
    fn everything_else_is_internal() {
        let obj = McpError::internal("oops").to_error_object();
        assert_eq!(obj.code, -32603);
    }
}
