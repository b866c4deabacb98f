//! Middleware composition.
//!
//! A middleware wraps a [`MessageHandler`] — the `(ctx, bytes)` function at
//! the heart of one connection — and produces another. The chain is built
//! once per connection; [`MiddlewareChain::build`] consumes the builder, so
//! adding layers after materialization is impossible by construction.

pub mod validation;

use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;

use drover_core::{McpResult, RequestContext};

/// The composed per-connection message handler.
///
/// Takes the raw frame bytes and returns response bytes, `None` for
/// notifications, or an error for the server loop to map onto the wire.
pub type MessageHandler =
    Arc<dyn Fn(RequestContext, Bytes) -> BoxFuture<'static, McpResult<Option<Bytes>>> + Send + Sync>;

/// A layer in the middleware chain.
pub trait Middleware: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Wrap the downstream handler.
    fn wrap(&self, next: MessageHandler) -> MessageHandler;
}

/// Ordered builder of middleware layers around a terminal handler.
///
/// Layers apply in registration order: the first pushed executes first on
/// the way in and last on the way out.
#[derive(Default)]
pub struct MiddlewareChain {
    layers: Vec<Box<dyn Middleware>>,
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.layers.iter().map(|l| l.name()).collect();
        f.debug_struct("MiddlewareChain")
            .field("layers", &names)
            .finish()
    }
}

impl MiddlewareChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer. Layers execute in the order they were pushed.
    #[must_use]
    pub fn push(mut self, middleware: impl Middleware + 'static) -> Self {
        self.layers.push(Box::new(middleware));
        self
    }

    /// Materialize the chain around the terminal handler.
    ///
    /// Consumes the builder; the produced handler is the frozen chain.
    #[must_use]
    pub fn build(self, terminal: MessageHandler) -> MessageHandler {
        self.layers
            .into_iter()
            .rev()
            .fold(terminal, |next, layer| layer.wrap(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Appends its tag on the way in and out, to observe ordering.
    struct Tagger {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Tagger {
        fn name(&self) -> &str {
            self.tag
        }

        fn wrap(&self, next: MessageHandler) -> MessageHandler {
            let tag = self.tag;
            let log = Arc::clone(&self.log);
            Arc::new(move |ctx, bytes| {
                let log = Arc::clone(&log);
                let next = Arc::clone(&next);
                Box::pin(async move {
                    log.lock().push(format!("{tag}:in"));
                    let result = next(ctx, bytes).await;
                    log.lock().push(format!("{tag}:out"));
                    result
                })
            })
        }
    }

    #[tokio::test]
    async fn first_registered_runs_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let terminal: MessageHandler = {
            let log = Arc::clone(&log);
            Arc::new(move |_ctx, _bytes| {
                let log = Arc::clone(&log);
                Box::pin(async move {
                    log.lock().push("terminal".to_string());
                    Ok(None)
                })
            })
        };

        let chain = MiddlewareChain::new()
            .push(Tagger {
                tag: "a",
                log: Arc::clone(&log),
            })
            .push(Tagger {
                tag: "b",
                log: Arc::clone(&log),
            })
            .build(terminal);

        chain(RequestContext::new(), Bytes::from_static(b"{}"))
            .await
            .unwrap();

        let observed = log.lock().clone();
        assert_eq!(
            observed,
            vec!["a:in", "b:in", "terminal", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn empty_chain_is_the_terminal() {
        let terminal: MessageHandler =
            Arc::new(|_ctx, bytes| Box::pin(async move { Ok(Some(bytes)) }));
        let chain = MiddlewareChain::new().build(terminal);
        let out = chain(RequestContext::new(), Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(out.unwrap(), Bytes::from_static(b"x"));
    }
}
