//! Command dispatch for incoming `PRIVMSG`es (spec §4.8).
//!
//! A command is triggered either by the configured prefix (`!cmd ...`) or
//! by addressing the bot directly (`<nick>: cmd ...`).
//! [`Dispatcher`] is itself a [`Listener`](crate::listeners::Listener), so
//! it drops into [`crate::listeners::ListenerRegistry`] alongside the
//! built-in catalog and replies through the same outgoing queue.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::command::Command;
use crate::error::DispatchError;
use crate::listeners::{Listener, ListenerCtx, ListenerError, ListenerWarning};
use crate::message::Message;

use super::registry::{BoundValue, CommandRegistry, ParamKind};

/// Everything a handler needs about the message that triggered it, beyond
/// its bound parameters.
#[derive(Clone, Debug)]
pub struct CommandContext {
    pub sender_nick: String,
    pub sender_account: Option<String>,
    /// Where a reply should go: the channel if this was a channel message,
    /// the sender's nick if it was a private message.
    pub reply_target: String,
    pub command: String,
    /// Whitespace-delimited tokens after the trigger, empties dropped.
    pub args: Vec<String>,
    /// Single-space-delimited tokens after the trigger, preserving repeats.
    pub raw_args: Vec<String>,
    /// The triggered text, trimmed, with the trigger itself stripped.
    pub full_line: String,
}

/// Grants permissions to accounts (spec §6.2's `Permissions` table).
/// An unauthenticated sender (`account: None`) is granted nothing beyond
/// commands with no `permission` requirement.
#[derive(Debug, Clone, Default)]
pub struct PermissionManager {
    granted: HashMap<String, Vec<String>>,
}

impl PermissionManager {
    #[must_use]
    pub fn new(granted: HashMap<String, Vec<String>>) -> Self {
        Self { granted }
    }

    #[must_use]
    pub fn allows(&self, account: Option<&str>, permission: &str) -> bool {
        account
            .and_then(|a| self.granted.get(a))
            .is_some_and(|perms| perms.iter().any(|p| p == permission))
    }
}

/// Binds a trigger line against the registry and runs the matched handler.
pub struct Dispatcher {
    registry: CommandRegistry,
    permissions: PermissionManager,
    prefix: String,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: CommandRegistry, permissions: PermissionManager, prefix: String) -> Self {
        Self {
            registry,
            permissions,
            prefix,
        }
    }

    /// Strip a prefix or `<nick>: ` highlight trigger from `text`, returning
    /// the remainder. `None` if `text` wasn't triggered at all.
    fn strip_trigger<'a>(&self, self_nick: &str, text: &'a str) -> Option<&'a str> {
        if let Some(rest) = text.strip_prefix(self.prefix.as_str()) {
            if !rest.is_empty() {
                return Some(rest);
            }
        }
        if let Some(rest) = text.strip_prefix(self_nick) {
            if let Some(rest) = rest.strip_prefix(':') {
                return Some(rest.trim_start());
            }
        }
        None
    }

    async fn run(&self, ctx: &ListenerCtx<'_>, msg: &Message) -> Result<(), ListenerError> {
        let Command::Privmsg { target, text } = &msg.command else {
            return Ok(());
        };
        let Some(sender_nick) = msg.prefix.as_ref().and_then(|p| p.nick()) else {
            return Ok(());
        };

        let snapshot = ctx.state.read();
        let Some(self_nick) = snapshot.self_user().map(|u| u.nick.clone()) else {
            return Ok(());
        };
        let Some(rest) = self.strip_trigger(&self_nick, text) else {
            return Ok(());
        };

        let args: Vec<&str> = rest.split_whitespace().collect();
        let Some((verb, positional)) = args.split_first() else {
            return Ok(());
        };
        let Some(spec) = self.registry.get(verb) else {
            tracing::debug!(command = %verb, "no handler registered");
            return Ok(());
        };

        let sender_account = snapshot
            .get_user_by_nick(sender_nick)
            .and_then(|u| u.account.clone());

        if let Some(permission) = &spec.permission {
            if !self.permissions.allows(sender_account.as_deref(), permission) {
                tracing::info!(
                    command = %verb,
                    sender = %sender_nick,
                    permission = %permission,
                    "permission denied"
                );
                return Ok(());
            }
        }

        let reply_target = if snapshot.chantypes.contains(target.chars().next().unwrap_or(' ')) {
            target.clone()
        } else {
            sender_nick.to_string()
        };

        // `rest` may still carry leading whitespace on the prefix-trigger
        // path (the colon-trigger path already trims it), so the verb's
        // extent has to be located rather than assumed to start at index 0.
        let verb_start = rest.find(|c: char| !c.is_whitespace()).unwrap_or(0);
        let after_verb = &rest[verb_start + verb.len()..];
        let raw_args: Vec<String> = match after_verb.strip_prefix(' ').unwrap_or(after_verb) {
            "" => Vec::new(),
            remainder => remainder.split(' ').map(str::to_string).collect(),
        };

        let command_context = CommandContext {
            sender_nick: sender_nick.to_string(),
            sender_account,
            reply_target: reply_target.clone(),
            command: verb.to_ascii_uppercase(),
            args: positional.iter().map(|s| s.to_string()).collect(),
            raw_args,
            full_line: rest.trim().to_string(),
        };

        let bound = match bind_params(&spec.params, &command_context.command, positional) {
            Ok(bound) => bound,
            Err(e) => {
                tracing::info!(command = %verb, "parameter validation failed: {e}");
                return Ok(());
            }
        };

        match spec.handler.call(command_context, bound).await {
            Ok(Some(reply)) => {
                let _ = ctx.outgoing.send(Message::privmsg(reply_target, reply));
            }
            Ok(None) => {}
            Err(e) => {
                return Err(ListenerWarning(format!("command {verb} failed: {e}")).into());
            }
        }
        Ok(())
    }
}

fn bind_params(
    params: &[super::registry::ParamSpec],
    command_name: &str,
    tokens: &[&str],
) -> Result<Vec<BoundValue>, DispatchError> {
    let mut bound = Vec::with_capacity(params.len());
    let mut cursor = 0usize;

    for param in params {
        match param.kind {
            ParamKind::CommandName => {
                bound.push(BoundValue::CommandName(command_name.to_string()));
            }
            ParamKind::Rest => {
                bound.push(BoundValue::Text(tokens[cursor..].join(" ")));
                cursor = tokens.len();
            }
            ParamKind::Array => {
                bound.push(BoundValue::Array(
                    tokens[cursor..].iter().map(|s| s.to_string()).collect(),
                ));
                cursor = tokens.len();
            }
            ParamKind::Number => {
                let Some(token) = tokens.get(cursor) else {
                    if param.required {
                        return Err(DispatchError::Validation {
                            parameter: param.name.clone(),
                            reason: "missing required parameter".to_string(),
                        });
                    }
                    bound.push(BoundValue::Number(0.0));
                    continue;
                };
                // A parse failure leaves the token unconsumed for the next
                // parameter rather than treating it as a malformed number.
                let Ok(value) = token.parse::<f64>() else {
                    bound.push(BoundValue::Number(0.0));
                    continue;
                };
                cursor += 1;
                if let Some((min, max)) = param.range {
                    if value < min || value > max {
                        return Err(DispatchError::Validation {
                            parameter: param.name.clone(),
                            reason: format!("{value} outside range [{min}, {max}]"),
                        });
                    }
                }
                bound.push(BoundValue::Number(value));
            }
            ParamKind::Text => {
                let Some(token) = tokens.get(cursor) else {
                    if param.required {
                        return Err(DispatchError::Validation {
                            parameter: param.name.clone(),
                            reason: "missing required parameter".to_string(),
                        });
                    }
                    bound.push(BoundValue::Text(String::new()));
                    continue;
                };
                cursor += 1;
                bound.push(BoundValue::Text((*token).to_string()));
            }
        }
    }

    Ok(bound)
}

type DispatchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ListenerError>> + Send + 'a>>;

impl Listener for Dispatcher {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> DispatchFuture<'a> {
        Box::pin(async move { self.run(ctx, cmd).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::registry::{CommandBuilder, ParamSpec};
    use tokio::sync::mpsc;

    fn registry_with_echo() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register(
            "echo",
            CommandBuilder::new()
                .param(ParamSpec::new("text", ParamKind::Rest))
                .build(|_ctx, args| async move {
                    let BoundValue::Text(t) = &args[0] else { unreachable!() };
                    Ok(Some(t.clone()))
                }),
        );
        registry
    }

    #[tokio::test]
    async fn prefix_trigger_invokes_handler_and_replies() {
        let dispatcher = Dispatcher::new(registry_with_echo(), PermissionManager::default(), "!".to_string());
        let state = crate::state::StateStore::new(crate::state::NetworkInfo::default());
        let self_user = crate::state::User::new("bot", "bot", "host");
        let self_id = self_user.id;
        state.update_user(self_user).unwrap();
        state.set_self_id(self_id);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = ListenerCtx { state: &state, outgoing: &tx };
        let msg: Message = ":alice!a@h PRIVMSG #chan :!echo hello world".parse().unwrap();

        let listener: &dyn Listener = &dispatcher;
        listener.handle(&ctx, &msg).await.unwrap();
        drop(tx);

        let reply = rx.recv().await.unwrap();
        assert_eq!(
            reply.command,
            Command::Privmsg { target: "#chan".to_string(), text: "hello world".to_string() }
        );
    }

    #[test]
    fn strip_trigger_recognizes_highlight() {
        let dispatcher = Dispatcher::new(CommandRegistry::new(), PermissionManager::default(), "!".to_string());
        assert_eq!(dispatcher.strip_trigger("bot", "bot: ping"), Some("ping"));
        assert_eq!(dispatcher.strip_trigger("bot", "bot, ping"), None);
        assert_eq!(dispatcher.strip_trigger("bot", "ignore me"), None);
    }

    #[tokio::test]
    async fn prefix_trigger_with_leading_space_does_not_leak_verb_into_raw_args() {
        let mut registry = CommandRegistry::new();
        registry.register(
            "cmd",
            CommandBuilder::new()
                .param(ParamSpec::new("rest", ParamKind::Rest))
                .build(|ctx, args| async move {
                    let BoundValue::Text(t) = &args[0] else { unreachable!() };
                    assert_eq!(ctx.raw_args, vec!["foo".to_string()]);
                    Ok(Some(t.clone()))
                }),
        );
        let dispatcher = Dispatcher::new(registry, PermissionManager::default(), "!".to_string());
        let state = crate::state::StateStore::new(crate::state::NetworkInfo::default());
        let self_user = crate::state::User::new("bot", "bot", "host");
        let self_id = self_user.id;
        state.update_user(self_user).unwrap();
        state.set_self_id(self_id);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = ListenerCtx { state: &state, outgoing: &tx };
        // A space right after the prefix leaves `rest` with leading
        // whitespace; the verb must not leak into raw_args as a result.
        let msg: Message = ":alice!a@h PRIVMSG #chan :! cmd foo".parse().unwrap();

        let listener: &dyn Listener = &dispatcher;
        listener.handle(&ctx, &msg).await.unwrap();
        drop(tx);
        rx.recv().await.unwrap();
    }

    #[test]
    fn number_param_parse_failure_leaves_token_for_next_param() {
        let params = vec![
            ParamSpec::new("count", ParamKind::Number),
            ParamSpec::new("rest", ParamKind::Rest),
        ];
        let bound = bind_params(&params, "CMD", &["notanumber", "leftover"]).unwrap();

        assert_eq!(bound[0], BoundValue::Number(0.0));
        let BoundValue::Text(rest) = &bound[1] else { panic!("expected Text") };
        assert_eq!(rest, "notanumber leftover");
    }
}
