//! Bot startup sequence and outbound send helpers (spec §4.9).
//!
//! [`BotRuntime::connect`] drives one network from a dialed [`Transport`]
//! through oper/services-oper and the configured channel joins, then hands
//! back an [`EngineHandle`] plus a [`tokio::task::JoinHandle`] for the
//! engine's own message loop. No global mutable bot registry: the caller
//! owns however many [`BotRuntime`]s it wants, same as it owns any other
//! value.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::casemap::irc_eq;
use crate::command::Command;
use crate::config::NetworkConfig;
use crate::engine::{oper, Engine, EngineConfig, EngineHandle, EngineOutcome};
use crate::error::{BotRuntimeError, ChannelAwaitError};
use crate::listeners::Listener;
use crate::message::Message;
use crate::ratelimit::RateLimitChain;
use crate::state::StateStore;
use crate::transport::{ConnectError, Transport};

/// RFC body budget for one outbound line, before the trailing CRLF
/// [`Message::to_wire_line`] appends.
const OUTBOUND_LINE_BUDGET: usize = 510;

/// A running network connection: the engine handle callers send through,
/// and a handle to the task driving its message loop.
pub struct BotRuntime {
    pub handle: EngineHandle,
    pub state: Arc<StateStore>,
    pub limiter: RateLimitChain,
    pub config: NetworkConfig,
    pub engine_task: tokio::task::JoinHandle<EngineOutcome>,
}

impl BotRuntime {
    /// Dial the first reachable configured server, run the registration
    /// handshake, establish operator status if configured, then join every
    /// configured channel before returning. Mirrors spec §4.9's startup
    /// order exactly; a channel join that exceeds `join_timeout` logs a
    /// warning and is treated as best-effort, not fatal.
    ///
    /// `extra_listeners` runs after the built-in catalog on every dispatched
    /// message — this is how a [`super::Dispatcher`] gets wired into the
    /// connection's message loop.
    pub async fn connect(
        config: NetworkConfig,
        have_client_cert: bool,
        extra_listeners: Vec<Box<dyn Listener>>,
    ) -> Result<Self, BotRuntimeError> {
        let transport = Self::dial(&config).await?;
        let have_channel_binding = transport
            .channel_binding(crate::transport::ChannelBindingKind::Endpoint)
            .is_some();

        let engine_config = EngineConfig {
            handshake: config.handshake_config(have_client_cert, have_channel_binding),
            ping_interval: config.ping_interval,
            ping_timeout: config.ping_timeout,
        };
        let state = Arc::new(StateStore::default());
        let (mut engine, handle) = Engine::new(transport, engine_config, Arc::clone(&state));
        for listener in extra_listeners {
            engine.register_listener(listener);
        }
        let limiter = config.rate_limit_chain();

        // Subscribe before spawning the engine task: the broadcast channel
        // only delivers messages sent after a receiver subscribes, and the
        // 001 RPL_WELCOME that completes registration can arrive as soon as
        // the task starts running.
        let operational = handle.subscribe();
        let engine_task = tokio::spawn(engine.run());

        Self::wait_for_operational(operational).await?;

        Self::establish_oper(&config, &handle).await;

        for channel in &config.channels {
            if let Err(e) = join_channel(
                &handle,
                &config.primary_nick,
                &channel.name,
                channel.key.as_deref(),
                config.join_timeout,
            )
            .await
            {
                tracing::warn!(channel = %channel.name, "join failed: {e}");
            }
        }

        Ok(Self {
            handle,
            state,
            limiter,
            config,
            engine_task,
        })
    }

    async fn dial(config: &NetworkConfig) -> Result<Transport, BotRuntimeError> {
        let mut last_error = None;
        for _ in 0..config.connect_retries.max(1) {
            for server in &config.servers {
                let result = if server.uses_tls() {
                    Transport::connect_tls(
                        &server.host,
                        server.port,
                        config.connect_timeout,
                        &crate::transport::TlsOptions {
                            verify: if config.accept_all_certificates {
                                crate::transport::TlsVerifyMode::AcceptAll
                            } else if !config.trusted_fingerprints.is_empty() {
                                crate::transport::TlsVerifyMode::FingerprintPin(
                                    config.trusted_fingerprints.clone(),
                                )
                            } else {
                                crate::transport::TlsVerifyMode::FullCa
                            },
                            online_revocation_check: config.check_online_revocation,
                            client_cert: None,
                        },
                    )
                    .await
                } else {
                    Transport::connect(&server.host, server.port, config.connect_timeout).await
                };
                match result {
                    Ok(transport) => return Ok(transport),
                    Err(e) => last_error = Some(e),
                }
            }
        }
        Err(BotRuntimeError::Connect(
            last_error.map(|e: ConnectError| e.to_string()).unwrap_or_else(|| "no servers configured".to_string()),
        ))
    }

    /// Block until `001 RPL_WELCOME` (published as the first event once
    /// the engine transitions to `Operational`) or a handshake failure.
    async fn wait_for_operational(
        mut events: broadcast::Receiver<Message>,
    ) -> Result<(), BotRuntimeError> {
        loop {
            match events.recv().await {
                Ok(msg) if matches!(msg.command, Command::Numeric(1, _)) => return Ok(()),
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => {
                    return Err(BotRuntimeError::Connect("connection closed during registration".into()))
                }
            }
        }
    }

    async fn establish_oper(config: &NetworkConfig, handle: &EngineHandle) {
        if let (Some(name), Some(key_file)) = (&config.oper_name, &config.challenge_key_file) {
            let Ok(key_pem) = std::fs::read_to_string(key_file) else {
                tracing::warn!(file = %key_file, "could not read CHALLENGE key file, skipping oper");
                return;
            };
            match oper::challenge(
                handle,
                name,
                &key_pem,
                config.challenge_key_password.as_deref(),
            )
            .await
            {
                Ok(outcome) => tracing::info!(?outcome, "CHALLENGE oper attempt finished"),
                Err(e) => tracing::warn!("CHALLENGE oper attempt failed locally: {e:?}"),
            }
        } else if let (Some(name), Some(password)) = (&config.oper_name, &config.oper_password) {
            let outcome = oper::oper(handle, name, password).await;
            tracing::info!(?outcome, "OPER attempt finished");
        } else if config.oper_name.is_some() {
            tracing::warn!("OperName configured with neither OperPassword nor ChallengeKeyFile; skipping oper");
        }

        if let (Some(command), Some(password)) = (&config.service_oper_command, &config.service_oper_password) {
            oper::services_oper(handle, command, password).await;
        }
    }
}

/// Send `JOIN channel[ key]` and wait for the self-JOIN echo, a JOIN-failure
/// numeric for this channel, or `timeout` to elapse (soft deadline: a
/// timeout warns and is treated as success, per spec §6.2's `JoinTimeout`).
pub async fn join_channel(
    handle: &EngineHandle,
    self_nick: &str,
    channel: &str,
    key: Option<&str>,
    timeout: Duration,
) -> Result<(), ChannelAwaitError> {
    let mut events = handle.subscribe();
    handle.send(Message::new(Command::Join {
        channels: vec![channel.to_string()],
        keys: key.map(|k| vec![k.to_string()]).unwrap_or_default(),
        extended: None,
    }));

    let wait = wait_for_join(&mut events, self_nick, channel);
    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(channel, "JOIN await exceeded JoinTimeout; proceeding");
            Ok(())
        }
    }
}

/// Send `PART channel` and wait for the self-PART echo or a PART-failure
/// numeric for this channel.
pub async fn part_channel(
    handle: &EngineHandle,
    self_nick: &str,
    channel: &str,
    message: Option<String>,
) -> Result<(), ChannelAwaitError> {
    let mut events = handle.subscribe();
    handle.send(Message::new(Command::Part {
        channels: vec![channel.to_string()],
        message,
    }));
    wait_for_part(&mut events, self_nick, channel).await
}

async fn wait_for_join(
    events: &mut broadcast::Receiver<Message>,
    self_nick: &str,
    channel: &str,
) -> Result<(), ChannelAwaitError> {
    loop {
        match events.recv().await {
            Ok(msg) => {
                let from_self = msg.prefix.as_ref().and_then(|p| p.nick()) == Some(self_nick);
                match &msg.command {
                    Command::Join { channels, .. }
                        if from_self && channels.iter().any(|c| irc_eq(c, channel)) =>
                    {
                        return Ok(());
                    }
                    Command::Numeric(code @ (403 | 405 | 471 | 473 | 474 | 475), args)
                        if args.get(1).is_some_and(|c| irc_eq(c, channel)) =>
                    {
                        return Err(ChannelAwaitError::Numeric {
                            numeric: *code,
                            channel: channel.to_string(),
                            detail: args.last().cloned().unwrap_or_default(),
                        });
                    }
                    Command::Numeric(code @ 476, args)
                        if args.first().is_some_and(|c| irc_eq(c, channel)) =>
                    {
                        return Err(ChannelAwaitError::Numeric {
                            numeric: *code,
                            channel: channel.to_string(),
                            detail: args.last().cloned().unwrap_or_default(),
                        });
                    }
                    _ => {}
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return Err(ChannelAwaitError::Cancelled),
        }
    }
}

async fn wait_for_part(
    events: &mut broadcast::Receiver<Message>,
    self_nick: &str,
    channel: &str,
) -> Result<(), ChannelAwaitError> {
    loop {
        match events.recv().await {
            Ok(msg) => {
                let from_self = msg.prefix.as_ref().and_then(|p| p.nick()) == Some(self_nick);
                match &msg.command {
                    Command::Part { channels, .. }
                        if from_self && channels.iter().any(|c| irc_eq(c, channel)) =>
                    {
                        return Ok(());
                    }
                    Command::Numeric(code @ (403 | 442), args)
                        if args.get(1).is_some_and(|c| irc_eq(c, channel)) =>
                    {
                        return Err(ChannelAwaitError::Numeric {
                            numeric: *code,
                            channel: channel.to_string(),
                            detail: args.last().cloned().unwrap_or_default(),
                        });
                    }
                    _ => {}
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return Err(ChannelAwaitError::Cancelled),
        }
    }
}

/// Split `text` into UTF-8-bounded lines and send each as its own
/// `PRIVMSG`, rate-limited through `limiter`. Prefers `CPRIVMSG` when
/// `use_cprivmsg` is set and the bot holds a channel-op shared with the
/// target nick (spec §6.2's `UseCPrivmsg`).
pub async fn send_message(
    handle: &EngineHandle,
    limiter: &RateLimitChain,
    state: &StateStore,
    use_cprivmsg: bool,
    target: &str,
    text: &str,
) -> Result<(), crate::error::RateLimitError> {
    send_lines(handle, limiter, state, use_cprivmsg, target, text, false).await
}

/// As [`send_message`], but sends `NOTICE`/`CNOTICE`.
pub async fn send_notice(
    handle: &EngineHandle,
    limiter: &RateLimitChain,
    state: &StateStore,
    use_cprivmsg: bool,
    target: &str,
    text: &str,
) -> Result<(), crate::error::RateLimitError> {
    send_lines(handle, limiter, state, use_cprivmsg, target, text, true).await
}

async fn send_lines(
    handle: &EngineHandle,
    limiter: &RateLimitChain,
    state: &StateStore,
    use_cprivmsg: bool,
    target: &str,
    text: &str,
    notice: bool,
) -> Result<(), crate::error::RateLimitError> {
    let verb = if notice { "NOTICE" } else { "PRIVMSG" };
    let shared_op_channel = shared_opped_channel(state, use_cprivmsg, target);
    let overhead = verb.len() + 1 + target.len() + 2;
    let budget = OUTBOUND_LINE_BUDGET.saturating_sub(overhead).max(1);

    for line in crate::splitter::split(text, budget) {
        let byte_len = line.len() + overhead + 2;
        limiter.acquire_send(target, verb, 2, byte_len).await?;
        let msg = match (&shared_op_channel, notice) {
            (Some(channel), false) => Message::new(Command::CPrivmsg {
                target: target.to_string(),
                channel: channel.clone(),
                text: line,
            }),
            (Some(channel), true) => Message::new(Command::CNotice {
                target: target.to_string(),
                channel: channel.clone(),
                text: line,
            }),
            (None, false) => Message::privmsg(target, line),
            (None, true) => Message::notice(target, line),
        };
        handle.send(msg);
    }
    Ok(())
}

/// A channel the bot and `target_nick` both occupy, with the bot opped in
/// it — the condition spec's `UseCPrivmsg` requires before preferring
/// `CPRIVMSG`/`CNOTICE` over a plain send.
fn shared_opped_channel(state: &StateStore, use_cprivmsg: bool, target_nick: &str) -> Option<String> {
    if !use_cprivmsg {
        return None;
    }
    let snapshot = state.read();
    if snapshot.chantypes.contains(target_nick.chars().next().unwrap_or(' ')) {
        return None;
    }
    let self_user = snapshot.self_user()?;
    let target_user = snapshot.get_user_by_nick(target_nick)?;
    self_user
        .channels
        .iter()
        .find(|(chan_id, prefix)| prefix.contains('@') && target_user.channels.contains_key(chan_id))
        .and_then(|(chan_id, _)| snapshot.get_channel(*chan_id))
        .map(|c| c.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_budget_leaves_room_for_target_and_verb() {
        let overhead = "PRIVMSG".len() + 1 + "#somewhat-long-channel".len() + 2;
        assert!(OUTBOUND_LINE_BUDGET > overhead);
    }

    fn sender_msg(raw: &str) -> Message {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn wait_for_join_succeeds_on_self_echo() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(sender_msg(":other!o@h JOIN #chan")).unwrap();
        tx.send(sender_msg(":me!m@h JOIN #chan")).unwrap();

        wait_for_join(&mut rx, "me", "#chan").await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_join_fails_on_banned_numeric() {
        let (tx, mut rx) = broadcast::channel(8);
        // 474 ERR_BANNEDFROMCHAN: <client> <channel> :Cannot join channel (+b)
        tx.send(sender_msg(":server 474 me #chan :Cannot join channel (+b)"))
            .unwrap();

        let err = wait_for_join(&mut rx, "me", "#chan").await.unwrap_err();
        assert!(matches!(err, ChannelAwaitError::Numeric { numeric: 474, .. }));
    }

    #[tokio::test]
    async fn wait_for_join_fails_on_bad_key_numeric() {
        let (tx, mut rx) = broadcast::channel(8);
        // 475 ERR_BADCHANNELKEY: <client> <channel> :Cannot join channel (+k)
        tx.send(sender_msg(":server 475 me #chan :Cannot join channel (+k)"))
            .unwrap();

        let err = wait_for_join(&mut rx, "me", "#chan").await.unwrap_err();
        assert!(matches!(err, ChannelAwaitError::Numeric { numeric: 475, .. }));
    }

    #[tokio::test]
    async fn wait_for_join_fails_on_too_many_channels_numeric() {
        let (tx, mut rx) = broadcast::channel(8);
        // 405 ERR_TOOMANYCHANNELS: <client> <channel> :You have joined too many channels
        tx.send(sender_msg(":server 405 me #chan :You have joined too many channels"))
            .unwrap();

        let err = wait_for_join(&mut rx, "me", "#chan").await.unwrap_err();
        assert!(matches!(err, ChannelAwaitError::Numeric { numeric: 405, .. }));
    }

    #[tokio::test]
    async fn wait_for_join_ignores_other_channels_failure() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(sender_msg(":server 474 me #other :Cannot join channel (+b)"))
            .unwrap();
        tx.send(sender_msg(":me!m@h JOIN #chan")).unwrap();

        wait_for_join(&mut rx, "me", "#chan").await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_part_succeeds_on_self_echo() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(sender_msg(":me!m@h PART #chan")).unwrap();

        wait_for_part(&mut rx, "me", "#chan").await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_part_fails_on_not_on_channel_numeric() {
        let (tx, mut rx) = broadcast::channel(8);
        // 442 ERR_NOTONCHANNEL: <client> <channel> :You're not on that channel
        tx.send(sender_msg(":server 442 me #chan :You're not on that channel"))
            .unwrap();

        let err = wait_for_part(&mut rx, "me", "#chan").await.unwrap_err();
        assert!(matches!(err, ChannelAwaitError::Numeric { numeric: 442, .. }));
    }
}
