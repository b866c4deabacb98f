//! Connection lifecycle state machine.
//!
//! One connection moves through a closed set of phases; the transition
//! table and the method-sequence table are const data consulted by the
//! router before any handler runs. Sequence violations never change state.

use parking_lot::RwLock;

use drover_core::types::{ClientCapabilities, Implementation};
use drover_core::{McpError, McpResult};

/// Protocol phase of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No `initialize` request seen yet.
    Uninitialized,
    /// `initialize` accepted, waiting for `notifications/initialized`.
    Initializing,
    /// Handshake complete; domain methods are served.
    Initialized,
    /// `shutdown` accepted, waiting for `exit`.
    ShuttingDown,
    /// Connection is over.
    Shutdown,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::ShuttingDown => "shutting_down",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Triggers that move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// An `initialize` request was accepted.
    InitializeAccepted,
    /// The `notifications/initialized` notification arrived.
    InitializedReceived,
    /// A `shutdown` request was accepted.
    ShutdownRequested,
    /// The `exit` notification arrived.
    ExitReceived,
    /// The transport reached EOF or was closed.
    TransportClosed,
}

/// Permitted transitions: (from, trigger) -> to.
///
/// `TransportClosed` is handled separately; it maps every phase to
/// `Shutdown`.
const TRANSITIONS: &[(ConnectionPhase, StateEvent, ConnectionPhase)] = &[
    (
        ConnectionPhase::Uninitialized,
        StateEvent::InitializeAccepted,
        ConnectionPhase::Initializing,
    ),
    (
        ConnectionPhase::Initializing,
        StateEvent::InitializedReceived,
        ConnectionPhase::Initialized,
    ),
    (
        ConnectionPhase::Initialized,
        StateEvent::ShutdownRequested,
        ConnectionPhase::ShuttingDown,
    ),
    (
        ConnectionPhase::Initialized,
        StateEvent::ExitReceived,
        ConnectionPhase::Shutdown,
    ),
    (
        ConnectionPhase::ShuttingDown,
        StateEvent::ExitReceived,
        ConnectionPhase::Shutdown,
    ),
];

/// Phases in which each method is allowed.
///
/// `ping` is additionally tolerated in `Initializing` so clients can probe
/// liveness during the handshake. Methods not matched here (directly or by
/// prefix) are routed and answered with method-not-found by the router.
const METHOD_SEQUENCE: &[(&str, &[ConnectionPhase])] = &[
    ("initialize", &[ConnectionPhase::Uninitialized]),
    ("notifications/initialized", &[ConnectionPhase::Initializing]),
    ("shutdown", &[ConnectionPhase::Initialized]),
    (
        "exit",
        &[ConnectionPhase::Initialized, ConnectionPhase::ShuttingDown],
    ),
    ("$/cancelRequest", &[ConnectionPhase::Initialized]),
    (
        "ping",
        &[ConnectionPhase::Initializing, ConnectionPhase::Initialized],
    ),
];

/// Method prefixes gated to the `Initialized` phase.
const INITIALIZED_ONLY_PREFIXES: &[&str] =
    &["tools/", "resources/", "prompts/", "logging/", "completion/"];

const INITIALIZED_ONLY: &[ConnectionPhase] = &[ConnectionPhase::Initialized];

#[derive(Debug)]
struct Inner {
    phase: ConnectionPhase,
    client_info: Option<Implementation>,
    client_capabilities: Option<ClientCapabilities>,
}

/// Thread-safe holder of the connection phase and negotiated client data.
///
/// Writers (transitions) serialize through the lock; readers may query the
/// phase concurrently. Client info and capabilities are set exactly once,
/// during `initialize`.
#[derive(Debug)]
pub struct ConnectionState {
    inner: RwLock<Inner>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    /// Create a state machine in `Uninitialized`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                phase: ConnectionPhase::Uninitialized,
                client_info: None,
                client_capabilities: None,
            }),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        self.inner.read().phase
    }

    /// Negotiated client info, if `initialize` stored one.
    #[must_use]
    pub fn client_info(&self) -> Option<Implementation> {
        self.inner.read().client_info.clone()
    }

    /// Negotiated client capabilities, if `initialize` stored them.
    #[must_use]
    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.inner.read().client_capabilities.clone()
    }

    /// Store client info and capabilities. Only valid during the
    /// `initialize` transition; repeated writes are rejected.
    pub fn set_client(
        &self,
        info: Option<Implementation>,
        capabilities: Option<ClientCapabilities>,
    ) -> McpResult<()> {
        let mut inner = self.inner.write();
        if inner.client_info.is_some() || inner.client_capabilities.is_some() {
            return Err(McpError::internal("client info already negotiated"));
        }
        inner.client_info = info;
        inner.client_capabilities = capabilities;
        Ok(())
    }

    /// Apply a trigger, returning the new phase.
    ///
    /// Fails with a sequence error if the transition table has no entry for
    /// the (phase, trigger) pair; the phase is left unchanged in that case.
    pub fn transition(&self, event: StateEvent) -> McpResult<ConnectionPhase> {
        let mut inner = self.inner.write();

        if event == StateEvent::TransportClosed {
            inner.phase = ConnectionPhase::Shutdown;
            return Ok(inner.phase);
        }

        let next = TRANSITIONS
            .iter()
            .find(|(from, trigger, _)| *from == inner.phase && *trigger == event)
            .map(|(_, _, to)| *to);

        match next {
            Some(to) => {
                tracing::debug!(from = %inner.phase, to = %to, ?event, "state transition");
                inner.phase = to;
                Ok(to)
            }
            None => Err(McpError::request_sequence(
                format!("{event:?}"),
                inner.phase.to_string(),
            )),
        }
    }

    /// Check that `method` is allowed in the current phase.
    ///
    /// Violations produce a `RequestSequence` error carrying the method and
    /// the current phase; the phase is not changed. Methods unknown to the
    /// sequence table are allowed through so the router can answer with
    /// method-not-found.
    pub fn validate_method_sequence(&self, method: &str) -> McpResult<()> {
        let phase = self.phase();

        let allowed = METHOD_SEQUENCE
            .iter()
            .find(|(name, _)| *name == method)
            .map(|(_, phases)| *phases)
            .or_else(|| {
                INITIALIZED_ONLY_PREFIXES
                    .iter()
                    .any(|prefix| method.starts_with(prefix))
                    .then_some(INITIALIZED_ONLY)
            });

        match allowed {
            Some(phases) if !phases.contains(&phase) => {
                Err(McpError::request_sequence(method, phase.to_string()))
            }
            _ => Ok(()),
        }
    }
}
