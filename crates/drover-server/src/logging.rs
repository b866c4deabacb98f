//! Logging bootstrap.
//!
//! For STDIO MCP servers, stdout is reserved exclusively for JSON-RPC
//! frames; all log output goes to stderr. `RUST_LOG` overrides the
//! configured level when set.

use std::io;

use tracing_subscriber::EnvFilter;

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// No logging.
    None,
    /// Log to stderr (the only safe target next to a stdio transport).
    Stderr,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `"info"` or `"drover_server=debug"`.
    pub level: String,
    /// Output target.
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stderr,
        }
    }
}

impl LoggingConfig {
    /// Stderr logging at the given level.
    #[must_use]
    pub fn stderr(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            output: LogOutput::Stderr,
        }
    }

    /// Disable logging entirely.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            level: String::new(),
            output: LogOutput::None,
        }
    }

    /// Install the global tracing subscriber for this configuration.
    ///
    /// Safe to call once per process; a second call fails because the
    /// global subscriber is already set.
    pub fn init(&self) -> io::Result<()> {
        match self.output {
            LogOutput::None => Ok(()),
            LogOutput::Stderr => {
                let filter = EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(&self.level));
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(io::stderr)
                    .try_init()
                    .map_err(io::Error::other)
            }
        }
    }
}
