//! Application-facing callbacks: the session lifecycle listener, named
//! event handlers, and the responder for acknowledging inbound events.

use serde_json::Value;
use tokio::sync::mpsc;

use wavelink_transport::TransportError;

use crate::session::Command;
use crate::ClientError;

// ---------------------------------------------------------------------------
// Lifecycle listener
// ---------------------------------------------------------------------------

/// Receives session lifecycle notifications.
///
/// All methods have empty defaults — implement only what you need.
/// Callbacks run on the session's engine task and must return quickly;
/// they never block inbound delivery.
pub trait SessionListener: Send + 'static {
    /// The connection is open and the handshake has been sent.
    fn on_connected(&mut self) {}

    /// The connection dropped. `cause` is `None` for a clean peer close
    /// or an explicit [`disconnect`](crate::Session::disconnect), and
    /// carries the transport error otherwise.
    fn on_disconnected(&mut self, _cause: Option<&TransportError>) {}

    /// A connection attempt failed before the session opened.
    fn on_connect_error(&mut self, _error: &TransportError) {}

    /// The server reported the session's authentication status.
    fn on_authenticated(&mut self, _authenticated: bool) {}

    /// The server installed a new auth token.
    fn on_auth_token_set(&mut self, _token: &str) {}
}

/// The listener used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl SessionListener for NoopListener {}

// ---------------------------------------------------------------------------
// Named event handlers
// ---------------------------------------------------------------------------

/// Handler for a named server event, invoked with the event payload.
pub type EventHandler = Box<dyn FnMut(Option<Value>) + Send>;

/// Handler for a named server event that may expect an acknowledgment.
///
/// The [`Responder`] is `Some` when the inbound event carried a call id
/// — the server is waiting for a reply.
pub type AckEventHandler =
    Box<dyn FnMut(Option<Value>, Option<Responder>) + Send>;

/// How a registered event handler wants to be invoked.
pub(crate) enum EventRoute {
    Plain(EventHandler),
    WithAck(AckEventHandler),
}

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

/// A single-shot reply to an inbound event that expects acknowledgment.
///
/// The reply `{error, data, rid}` echoes the event's call id and goes
/// out through the session's writer queue like every other message; it
/// carries no call id of its own. The responder may be sent to another
/// task and used later.
pub struct Responder {
    rid: u64,
    commands: mpsc::UnboundedSender<Command>,
}

impl Responder {
    pub(crate) fn new(
        rid: u64,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self { rid, commands }
    }

    /// The call id being answered.
    pub fn rid(&self) -> u64 {
        self.rid
    }

    /// Sends the acknowledgment, consuming the responder.
    pub fn respond(
        self,
        error: Option<Value>,
        data: Option<Value>,
    ) -> Result<(), ClientError> {
        self.commands
            .send(Command::Respond {
                rid: self.rid,
                error,
                data,
            })
            .map_err(|_| ClientError::SessionClosed)
    }
}

// =========================================================================
// Tests
// =========================================================================
