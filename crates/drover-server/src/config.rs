//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LoggingConfig;
use crate::middleware::validation::ValidationOptions;

/// Default timeout applied to each request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum wire message size (10MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = drover_core::MAX_MESSAGE_SIZE;

/// Configuration for one server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name reported in the `initialize` result.
    pub name: String,
    /// Server version reported in the `initialize` result.
    pub version: String,
    /// Protocol version the server speaks.
    pub protocol_version: String,
    /// Deadline for each request's handler.
    pub request_timeout: Duration,
    /// Frames larger than this are rejected without dispatch.
    pub max_message_size: usize,
    /// Validation middleware switches.
    pub validation: ValidationOptions,
    /// Override path for the MCP schema document; the embedded schema is
    /// used when unset.
    pub schema_path: Option<PathBuf>,
    /// Logging bootstrap settings.
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "drover-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: drover_core::PROTOCOL_VERSION.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            validation: ValidationOptions::default(),
            schema_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    name: Option<String>,
    version: Option<String>,
    protocol_version: Option<String>,
    request_timeout: Option<Duration>,
    max_message_size: Option<usize>,
    validation: Option<ValidationOptions>,
    schema_path: Option<PathBuf>,
    logging: Option<LoggingConfig>,
}

impl ServerConfigBuilder {
    /// Set the server name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the server version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Override the reported protocol version.
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = Some(version.into());
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the maximum accepted message size.
    #[must_use]
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Set the validation middleware options.
    #[must_use]
    pub fn validation(mut self, options: ValidationOptions) -> Self {
        self.validation = Some(options);
        self
    }

    /// Load the MCP schema from a file instead of the embedded document.
    #[must_use]
    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build the configuration, filling unset fields with defaults.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            name: self.name.unwrap_or(defaults.name),
            version: self.version.unwrap_or(defaults.version),
            protocol_version: self.protocol_version.unwrap_or(defaults.protocol_version),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            max_message_size: self.max_message_size.unwrap_or(defaults.max_message_size),
            validation: self.validation.unwrap_or(defaults.validation),
            schema_path: self.schema_path,
            logging: self.logging.unwrap_or(defaults.logging),
        }
    }
}
