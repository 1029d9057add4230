//! The incoming-command listener catalog (spec §4.6) and the registry that
//! dispatches every parsed [`Message`] to it in registration order.
//!
//! Listeners translate wire traffic into [`StateStore`] updates. A listener
//! that returns [`StateError`] aborts dispatch for that message (the engine
//! treats this as fatal and disconnects, per §7); any other error is logged
//! at `warn` and the remaining listeners still run.

mod catalog;

pub use catalog::default_listeners;

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::StateError;
use crate::message::Message;
use crate::state::StateStore;

/// Context a [`Listener`] runs with: a handle to the shared state store plus
/// an outbound queue for replies the listener itself must send (e.g. `PONG`
/// for an incoming `PING`).
pub struct ListenerCtx<'a> {
    pub state: &'a StateStore,
    pub outgoing: &'a UnboundedSender<Message>,
}

impl ListenerCtx<'_> {
    fn send(&self, msg: Message) {
        // The receiver only disappears once the engine's message loop has
        // already torn down the connection, in which case there is nothing
        // useful to do with a send failure.
        let _ = self.outgoing.send(msg);
    }
}

/// Non-fatal listener failure. Logged and swallowed by [`ListenerRegistry::dispatch`].
#[derive(Debug)]
pub struct ListenerWarning(pub String);

impl std::fmt::Display for ListenerWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single listener's handling of one message.
#[derive(Debug)]
pub enum ListenerError {
    /// A state-store invariant was violated; propagates out of
    /// [`ListenerRegistry::dispatch`] unchanged.
    State(StateError),
    /// Anything else; logged and dropped.
    Warning(ListenerWarning),
}

impl From<StateError> for ListenerError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<ListenerWarning> for ListenerError {
    fn from(e: ListenerWarning) -> Self {
        Self::Warning(e)
    }
}

type HandleFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ListenerError>> + Send + 'a>>;

/// A single incoming-command handler. Implementors match on
/// `cmd.command` and ignore messages they don't care about.
pub trait Listener: Send + Sync {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> HandleFuture<'a>;
}

/// Invokes every registered [`Listener`] for each inbound message, in
/// registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<Box<dyn Listener>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    /// The registry populated with the built-in catalog from §4.6, in the
    /// order listed there.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for listener in default_listeners() {
            registry.register(listener);
        }
        registry
    }

    pub fn register(&mut self, listener: Box<dyn Listener>) {
        self.listeners.push(listener);
    }

    /// Run every listener against `cmd`. Stops and propagates on the first
    /// [`StateError`]; any other error is logged and dispatch continues.
    pub async fn dispatch(&self, ctx: &ListenerCtx<'_>, cmd: &Message) -> Result<(), StateError> {
        for listener in &self.listeners {
            match listener.handle(ctx, cmd).await {
                Ok(()) => {}
                Err(ListenerError::State(e)) => return Err(e),
                Err(ListenerError::Warning(w)) => {
                    tracing::warn!(command = %cmd.command.verb(), "listener error: {w}");
                }
            }
        }
        Ok(())
    }
}
