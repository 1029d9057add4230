//! The protocol engine (spec §4.6): a cooperative single-task message loop
//! per connection, the registration handshake, and the auxiliary OPER/
//! CHALLENGE and SASL subsystems that ride on top of it.

pub mod handshake;
pub mod oper;
mod sasl_flow;

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::error::HandshakeError;
use crate::listeners::{ListenerCtx, ListenerRegistry};
use crate::message::Message;
use crate::state::{StateStore, User};
use crate::transport::Transport;

pub use handshake::{HandshakeAction, HandshakeConfig, HandshakeMachine, HandshakeState};

/// `PING` cookie prefix (spec §4.6): `NWPC` + 16 hex chars of randomness.
const PING_COOKIE_PREFIX: &str = "NWPC";

/// Static configuration for one connection's engine instance.
pub struct EngineConfig {
    pub handshake: HandshakeConfig,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

/// How a connection's message loop ended.
#[derive(Debug)]
pub enum EngineOutcome {
    /// `disconnect()` was called; `QUIT` was sent best-effort.
    Disconnected,
    /// The connection was lost or a ping went unanswered.
    Dropped(String),
    /// Registration never completed.
    HandshakeFailed(HandshakeError),
}

/// The caller-facing surface of a running engine: queue an outgoing message,
/// subscribe to every dispatched inbound message, or request a shutdown.
#[derive(Clone)]
pub struct EngineHandle {
    outgoing: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<Message>,
    cancel: CancellationToken,
}

impl EngineHandle {
    pub fn send(&self, msg: Message) {
        let _ = self.outgoing.send(msg);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    /// Request a graceful shutdown. `run()`'s current or next iteration
    /// sends `QUIT` and returns [`EngineOutcome::Disconnected`].
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

struct PingState {
    next_send: tokio::time::Instant,
    awaiting: Option<(String, tokio::time::Instant)>,
}

/// Owns one connection's socket, state store, and listener catalog.
pub struct Engine {
    transport: Transport,
    listeners: ListenerRegistry,
    state: Arc<StateStore>,
    config: EngineConfig,
    outgoing_rx: mpsc::UnboundedReceiver<Message>,
    outgoing_tx: mpsc::UnboundedSender<Message>,
    events_tx: broadcast::Sender<Message>,
    cancel: CancellationToken,
}

impl Engine {
    /// Build a new engine over `transport`, publishing state updates to
    /// `state` — share the same `Arc` with callers that need a live view of
    /// the connection (e.g. [`crate::bot::BotRuntime`]) without waiting for
    /// the engine to hand anything back.
    #[must_use]
    pub fn new(transport: Transport, config: EngineConfig, state: Arc<StateStore>) -> (Self, EngineHandle) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(1024);
        let cancel = CancellationToken::new();
        let handle = EngineHandle {
            outgoing: outgoing_tx.clone(),
            events: events_tx.clone(),
            cancel: cancel.clone(),
        };
        let engine = Self {
            transport,
            listeners: ListenerRegistry::with_defaults(),
            state,
            config,
            outgoing_rx,
            outgoing_tx,
            events_tx,
            cancel,
        };
        (engine, handle)
    }

    #[must_use]
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Register an additional listener (e.g. a bot command [`Dispatcher`]
    /// (crate::bot::Dispatcher)) to run after the built-in catalog, in the
    /// order registered. Must be called before [`Engine::run`].
    pub fn register_listener(&mut self, listener: Box<dyn crate::listeners::Listener>) {
        self.listeners.register(listener);
    }

    /// Run the message loop to completion: handshake, then steady-state
    /// dispatch, until disconnect, drop, or a fatal error.
    pub async fn run(mut self) -> EngineOutcome {
        let mut machine = HandshakeMachine::new(self.config.handshake.clone());
        let initial = machine.start();
        if let Some(outcome) = self.drive(initial, &mut machine).await {
            return outcome;
        }

        let mut ping = PingState {
            next_send: tokio::time::Instant::now() + self.config.ping_interval,
            awaiting: None,
        };

        loop {
            let ping_send = tokio::time::sleep_until(ping.next_send);
            let ping_timeout = async {
                match ping.awaiting {
                    Some((_, deadline)) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                line = self.transport.receive_line() => {
                    match line {
                        Ok(Some(raw)) => {
                            let Ok(msg) = raw.parse::<Message>() else { continue };
                            if let Command::Pong(cookie) = &msg.command {
                                if ping.awaiting.as_ref().is_some_and(|(c, _)| c == cookie) {
                                    ping.awaiting = None;
                                }
                                continue;
                            }
                            if *machine.state() != HandshakeState::Operational {
                                let actions = machine.feed(&msg);
                                if let Some(outcome) = self.drive(actions, &mut machine).await {
                                    return outcome;
                                }
                                if *machine.state() == HandshakeState::Operational {
                                    // Registration just completed on this message (001
                                    // RPL_WELCOME); publish it so callers awaiting
                                    // operational status (e.g. bot::runtime's startup
                                    // sequence) see it the same way they'd see any
                                    // other dispatched message.
                                    let _ = self.events_tx.send(msg);
                                }
                                continue;
                            }
                            let ctx = ListenerCtx { state: &self.state, outgoing: &self.outgoing_tx };
                            if let Err(e) = self.listeners.dispatch(&ctx, &msg).await {
                                tracing::error!("state invariant violated, disconnecting: {e}");
                                return EngineOutcome::Dropped(e.to_string());
                            }
                            let _ = self.events_tx.send(msg);
                        }
                        Ok(None) => return EngineOutcome::Dropped("connection closed by peer".into()),
                        Err(e) => return EngineOutcome::Dropped(e.to_string()),
                    }
                }

                Some(out) = self.outgoing_rx.recv() => {
                    if let Err(e) = self.transport.send(&out.to_wire_line()).await {
                        return EngineOutcome::Dropped(e.to_string());
                    }
                }

                () = ping_send, if ping.awaiting.is_none() => {
                    let cookie = generate_ping_cookie();
                    if let Err(e) = self.transport.send(&Message::ping(cookie.clone()).to_wire_line()).await {
                        return EngineOutcome::Dropped(e.to_string());
                    }
                    ping.awaiting = Some((cookie, tokio::time::Instant::now() + self.config.ping_timeout));
                    ping.next_send = tokio::time::Instant::now() + self.config.ping_interval;
                }

                () = ping_timeout, if ping.awaiting.is_some() => {
                    return EngineOutcome::Dropped("ping timeout: no PONG within deadline".into());
                }

                () = self.cancel.cancelled() => {
                    let _ = self.transport
                        .send(&Message::new(Command::Quit(Some("disconnecting".into()))).to_wire_line())
                        .await;
                    return EngineOutcome::Disconnected;
                }
            }
        }
    }

    async fn drive(
        &mut self,
        actions: Vec<HandshakeAction>,
        machine: &mut HandshakeMachine,
    ) -> Option<EngineOutcome> {
        for action in actions {
            match action {
                HandshakeAction::Send(msg) => {
                    if let Err(e) = self.transport.send(&msg.to_wire_line()).await {
                        return Some(EngineOutcome::Dropped(e.to_string()));
                    }
                }
                HandshakeAction::Complete { nick } => {
                    let user = User::new(nick, self.config.handshake.username.clone(), String::new());
                    let id = user.id;
                    if self.state.update_user(user).is_ok() {
                        self.state.set_self_id(id);
                    }
                }
                HandshakeAction::Failed(e) => return Some(EngineOutcome::HandshakeFailed(e)),
            }
        }
        let _ = machine;
        None
    }
}

fn generate_ping_cookie() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut cookie = String::from(PING_COOKIE_PREFIX);
    for b in bytes {
        cookie.push_str(&format!("{b:02x}"));
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_cookie_has_expected_shape() {
        let cookie = generate_ping_cookie();
        assert!(cookie.starts_with(PING_COOKIE_PREFIX));
        assert_eq!(cookie.len(), PING_COOKIE_PREFIX.len() + 16);
        assert!(cookie[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
