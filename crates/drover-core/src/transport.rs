//! Transport trait for framed byte streams.
//!
//! A transport frames whole messages over a byte stream; the server loop
//! is the only reader and the only writer. Every operation that may block
//! takes the caller's cancellation token.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A specialized `Result` for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by transport operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The stream reached EOF or the transport was closed.
    #[error("transport closed")]
    Closed,

    /// The operation did not complete within its timeout.
    #[error("transport operation timed out")]
    Timeout,

    /// The operation was cancelled via the caller's token.
    #[error("transport operation cancelled")]
    Cancelled,

    /// An underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether the server loop should exit on this error.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

/// A framed message stream.
///
/// Framing is newline-delimited JSON: one message per line, terminator
/// excluded from the bytes handed to and returned from the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read exactly one framed message.
    ///
    /// Returns [`TransportError::Closed`] at EOF, including a partial
    /// final line without a terminator.
    async fn read(&self, cancel: &CancellationToken) -> TransportResult<Bytes>;

    /// Write one message, appending the frame terminator.
    ///
    /// Writes are atomic with respect to other writes on this transport.
    async fn write(&self, message: &[u8], cancel: &CancellationToken) -> TransportResult<()>;

    /// Close the transport. Idempotent; subsequent reads fail with
    /// [`TransportError::Closed`].
    async fn close(&self);
}
