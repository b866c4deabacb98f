//! Per-request context threaded through every operation that may block.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Context handle passed to every handler and service call.
///
/// Carries a correlation id for logging, the cancellation token derived
/// from the connection's shutdown token, and the request deadline. Cloning
/// is cheap; clones share the same cancellation token.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id for log lines about this request.
    pub correlation_id: Uuid,
    /// Cancellation handle; fires on `$/cancelRequest`, `exit`, or shutdown.
    pub cancel: CancellationToken,
    /// Deadline for the whole request, from the configured request timeout.
    pub deadline: Option<Duration>,
}

impl RequestContext {
    /// Create a root context with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Create a context whose token is a child of `parent`.
    ///
    /// Cancelling the parent (connection shutdown) cancels this request;
    /// cancelling this request leaves the parent untouched.
    #[must_use]
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            cancel: parent.child_token(),
            deadline: None,
        }
    }

    /// Attach a request deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether this request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
