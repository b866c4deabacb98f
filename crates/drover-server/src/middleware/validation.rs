//! Schema validation middleware.
//!
//! Validates inbound frames against the MCP schema before they reach the
//! router, and optionally validates the frames the downstream handler
//! produces. The sub-schema is selected by the message's `method` field;
//! messages without one are checked against the base envelope schema.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};

use drover_core::{McpError, McpResult};

use super::{MessageHandler, Middleware};
use crate::schema::{BASE_MESSAGE_TYPE, SchemaValidator};

/// Behavior switches for the validation middleware.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Master switch; when false, frames pass through unchanged.
    pub enabled: bool,
    /// Incoming validation failures short-circuit to an error response.
    /// When false they are logged and the frame is passed downstream.
    pub strict_mode: bool,
    /// Also validate the bytes returned by the downstream handler.
    pub validate_outgoing: bool,
    /// Invalid outgoing bytes are replaced with an internal-error response
    /// instead of being passed with a warning.
    pub strict_outgoing: bool,
    /// Record validation latency at debug level.
    pub measure_performance: bool,
    /// Methods exempt from incoming validation.
    pub skip_types: HashSet<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_mode: true,
            validate_outgoing: false,
            strict_outgoing: false,
            measure_performance: false,
            skip_types: HashSet::new(),
        }
    }
}

impl ValidationOptions {
    /// Disable validation entirely.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Exempt a method from incoming validation.
    #[must_use]
    pub fn skip(mut self, method: impl Into<String>) -> Self {
        self.skip_types.insert(method.into());
        self
    }
}

/// Middleware applying the [`SchemaValidator`] to message traffic.
#[derive(Debug)]
pub struct ValidationMiddleware {
    validator: Arc<SchemaValidator>,
    options: ValidationOptions,
}

impl ValidationMiddleware {
    /// Create the middleware over an initialized validator.
    #[must_use]
    pub fn new(validator: Arc<SchemaValidator>, options: ValidationOptions) -> Self {
        Self { validator, options }
    }
}

/// Best-effort extraction of the `method` field from raw bytes.
fn extract_method(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    value
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl Middleware for ValidationMiddleware {
    fn name(&self) -> &str {
        "validation"
    }

    fn wrap(&self, next: MessageHandler) -> MessageHandler {
        let validator = Arc::clone(&self.validator);
        let options = self.options.clone();

        Arc::new(move |ctx, bytes: Bytes| {
            let validator = Arc::clone(&validator);
            let options = options.clone();
            let next = Arc::clone(&next);

            Box::pin(async move {
                if !options.enabled {
                    return next(ctx, bytes).await;
                }

                let method = extract_method(&bytes);
                let skipped = method
                    .as_deref()
                    .is_some_and(|m| options.skip_types.contains(m));

                if !skipped {
                    let message_type = method.as_deref().unwrap_or(BASE_MESSAGE_TYPE);
                    if let Err(e) = timed_validate(&validator, &options, message_type, &bytes) {
                        if options.strict_mode {
                            return Err(e);
                        }
                        warn!(
                            message_type,
                            error = %e,
                            "incoming message failed validation; passing through"
                        );
                    }
                }

                let response = next(ctx, bytes).await?;

                if options.validate_outgoing
                    && let Some(outgoing) = response.as_ref()
                {
                    let message_type = method
                        .as_deref()
                        .map_or_else(|| BASE_MESSAGE_TYPE.to_string(), SchemaValidator::response_type);
                    if let Err(e) = timed_validate(&validator, &options, &message_type, outgoing) {
                        if options.strict_outgoing {
                            return Err(McpError::internal(
                                "outgoing response failed schema validation",
                            )
                            .with_detail(e.to_string()));
                        }
                        warn!(
                            message_type = %message_type,
                            error = %e,
                            "outgoing response failed validation; passing through"
                        );
                    }
                }

                Ok(response)
            })
        })
    }
}

fn timed_validate(
    validator: &SchemaValidator,
    options: &ValidationOptions,
    message_type: &str,
    bytes: &[u8],
) -> McpResult<()> {
    let started = options.measure_performance.then(Instant::now);
    let result = validator.validate(message_type, bytes);
    if let Some(started) = started {
        debug!(
            message_type,
            elapsed_us = started.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "schema validation"
        );
    }
    result
}
