//! MCP schema loading and message validation.
//!
//! The validator compiles the embedded MCP schema document once at startup
//! and answers per-message validation on raw bytes. Sub-schemas are keyed
//! by logical message-type name (the method name, or `base` for the bare
//! JSON-RPC envelope); unknown names fall back to the base envelope schema,
//! which still catches malformed JSON-RPC shape.

use std::collections::HashMap;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;
use tracing::warn;

use drover_core::{ErrorKind, McpError, McpResult};

/// Logical name of the bare JSON-RPC envelope schema.
pub const BASE_MESSAGE_TYPE: &str = "base";

/// Name of the envelope definition inside the schema document.
const BASE_DEFINITION: &str = "JSONRPCMessage";

/// The MCP schema document, fixed at build time.
const EMBEDDED_SCHEMA: &str = include_str!("../schemas/mcp-2024-11-05.json");

/// Map of logical message-type names to definitions in the schema document.
///
/// Response entries are keyed `<method>:response` so outgoing validation
/// can pair a response with the method that produced it.
const MESSAGE_SCHEMAS: &[(&str, &str)] = &[
    ("initialize", "InitializeRequest"),
    ("ping", "PingRequest"),
    ("shutdown", "ShutdownRequest"),
    ("exit", "ExitNotification"),
    ("notifications/initialized", "InitializedNotification"),
    ("$/cancelRequest", "CancelRequestNotification"),
    ("tools/list", "ListToolsRequest"),
    ("tools/call", "CallToolRequest"),
    ("resources/list", "ListResourcesRequest"),
    ("resources/read", "ReadResourceRequest"),
    ("prompts/list", "ListPromptsRequest"),
    ("prompts/get", "GetPromptRequest"),
    ("logging/setLevel", "SetLevelRequest"),
    ("completion/complete", "CompleteRequest"),
    ("initialize:response", "InitializeResponse"),
    ("tools/call:response", "CallToolResponse"),
];

struct CompiledSchemas {
    base: Validator,
    subschemas: HashMap<String, Validator>,
}

/// Compiles the MCP schema and validates raw message bytes against it.
///
/// Immutable after [`initialize`](Self::initialize); reads are lock-free.
pub struct SchemaValidator {
    compiled: OnceLock<CompiledSchemas>,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    /// Create an uninitialized validator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            compiled: OnceLock::new(),
        }
    }

    /// Logical message-type name used to validate the response to `method`.
    #[must_use]
    pub fn response_type(method: &str) -> String {
        format!("{method}:response")
    }

    /// Compile the embedded MCP schema document.
    pub fn initialize(&self) -> McpResult<()> {
        self.initialize_with(EMBEDDED_SCHEMA)
    }

    /// Compile an override schema document instead of the embedded one.
    ///
    /// Idempotent: once a document is compiled, later calls are no-ops.
    pub fn initialize_with(&self, document: &str) -> McpResult<()> {
        if self.compiled.get().is_some() {
            return Ok(());
        }

        let doc: Value = serde_json::from_str(document).map_err(|e| {
            McpError::new(ErrorKind::SchemaLoad, format!("schema document: {e}"))
        })?;
        let definitions = doc
            .get("definitions")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                McpError::new(
                    ErrorKind::SchemaLoad,
                    "schema document has no 'definitions' section",
                )
            })?;

        let base_def = definitions.get(BASE_DEFINITION).ok_or_else(|| {
            McpError::new(
                ErrorKind::SchemaLoad,
                format!("schema document has no '{BASE_DEFINITION}' definition"),
            )
        })?;
        let base = jsonschema::validator_for(base_def)
            .map_err(|e| McpError::new(ErrorKind::SchemaCompile, format!("{BASE_DEFINITION}: {e}")))?;

        let mut subschemas = HashMap::new();
        for (message_type, definition) in MESSAGE_SCHEMAS.iter().copied() {
            let Some(def) = definitions.get(definition) else {
                warn!(message_type, definition, "schema definition missing; falling back to base");
                continue;
            };
            let validator = jsonschema::validator_for(def).map_err(|e| {
                McpError::new(ErrorKind::SchemaCompile, format!("{definition}: {e}"))
            })?;
            subschemas.insert(message_type.to_string(), validator);
        }

        let _ = self.compiled.set(CompiledSchemas { base, subschemas });
        Ok(())
    }

    /// Whether the schema has been compiled.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Whether a dedicated sub-schema exists for `message_type`.
    #[must_use]
    pub fn has_schema(&self, message_type: &str) -> bool {
        self.compiled
            .get()
            .is_some_and(|c| c.subschemas.contains_key(message_type))
    }

    /// Validate raw message bytes against the sub-schema for
    /// `message_type`, falling back to the base envelope schema.
    ///
    /// Unparseable input yields an `InvalidJsonFormat` error with an empty
    /// instance path; a structural mismatch yields a `SchemaViolation`
    /// carrying the instance and schema paths of the first failure.
    pub fn validate(&self, message_type: &str, bytes: &[u8]) -> McpResult<()> {
        let compiled = self.compiled.get().ok_or_else(|| {
            McpError::new(
                ErrorKind::SchemaNotInitialized,
                "schema validator used before initialization",
            )
        })?;

        let instance: Value = serde_json::from_slice(bytes)
            .map_err(|e| McpError::invalid_json_format(e.to_string()))?;

        let validator = compiled
            .subschemas
            .get(message_type)
            .unwrap_or(&compiled.base);

        let errors: Vec<_> = validator.iter_errors(&instance).collect();
        if errors.is_empty() {
            return Ok(());
        }

        let joined = errors
            .iter()
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect::<Vec<_>>()
            .join("; ");
        let first = &errors[0];
        Err(McpError::schema_violation(joined)
            .with_instance_path(first.instance_path.to_string())
            .with_schema_path(first.schema_path.to_string())
            .with_detail(format!("message type '{message_type}'")))
    }
}
