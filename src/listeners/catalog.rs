//! The built-in listener catalog from spec §4.6's incoming-command table.

use crate::command::Command;
use crate::error::StateError;
use crate::message::Message;
use crate::mode::{walk_channel_modes, walk_user_modes, ChannelModeEffect, Sign};
use crate::prefix::Prefix;
use crate::state::{Channel, User};
use crate::validation::validate_nickname;

use super::{HandleFuture, Listener, ListenerCtx, ListenerError, ListenerWarning};

/// The catalog in the order spec §4.6 lists it.
#[must_use]
pub fn default_listeners() -> Vec<Box<dyn Listener>> {
    vec![
        Box::new(MembershipListener),
        Box::new(IdentityListener),
        Box::new(WhoWhoisListener),
        Box::new(NamesTopicListener),
        Box::new(ModeListener),
        Box::new(RenameSetNameListener),
        Box::new(PingErrorListener),
    ]
}

fn sender_nick(msg: &Message) -> Option<&str> {
    msg.prefix.as_ref().and_then(Prefix::nick)
}

fn prefix_ident_host(prefix: &Prefix) -> (String, String) {
    match prefix {
        Prefix::Nick { user, host, .. } => (user.clone().unwrap_or_default(), host.clone().unwrap_or_default()),
        Prefix::Server(_) => (String::new(), String::new()),
    }
}

/// JOIN / PART / KICK / QUIT / NICK.
struct MembershipListener;

impl Listener for MembershipListener {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> HandleFuture<'a> {
        Box::pin(async move { self.dispatch(ctx, cmd).map_err(Into::into) })
    }
}

impl MembershipListener {
    fn dispatch(&self, ctx: &ListenerCtx<'_>, cmd: &Message) -> Result<(), StateError> {
        match &cmd.command {
            Command::Join { channels, extended, .. } => self.on_join(ctx, cmd, channels, extended),
            Command::Part { channels, .. } => self.on_part(ctx, cmd, channels),
            Command::Kick { channel, nick, .. } => self.on_kick(ctx, channel, nick),
            Command::Quit(_) => self.on_quit(ctx, cmd),
            Command::Nick(new_nick) => self.on_nick(ctx, cmd, new_nick),
            _ => Ok(()),
        }
    }

    fn on_join(
        &self,
        ctx: &ListenerCtx<'_>,
        cmd: &Message,
        channels: &[String],
        extended: &Option<(String, String)>,
    ) -> Result<(), StateError> {
        let Some(prefix) = &cmd.prefix else { return Ok(()) };
        let Some(nick) = prefix.nick() else { return Ok(()) };
        let Some(channel_name) = channels.first() else { return Ok(()) };

        let snapshot = ctx.state.read();
        let is_self = snapshot
            .self_user()
            .is_some_and(|u| u.nick.eq_ignore_ascii_case(nick));

        let channel_id = if let Some(existing) = snapshot.get_channel_by_name(channel_name) {
            existing.id
        } else if is_self {
            let channel = Channel::new(channel_name.clone());
            let id = channel.id;
            ctx.state.update_channel(channel)?;
            id
        } else {
            // Another user joined a channel we don't track; nothing to do.
            return Ok(());
        };

        let (ident, host) = prefix_ident_host(prefix);
        let snapshot = ctx.state.read();
        let mut user = snapshot
            .get_user_by_nick(nick)
            .map(|u| (*u).clone())
            .unwrap_or_else(|| User::new(nick, ident.clone(), host.clone()));
        if !ident.is_empty() {
            user.ident = ident;
        }
        if !host.is_empty() {
            user.host = host;
        }
        if let Some((account, realname)) = extended {
            user.account = if account == "*" { None } else { Some(account.clone()) };
            user.realname = realname.clone();
        }
        user.channels.entry(channel_id).or_insert_with(String::new);
        let user_id = user.id;
        ctx.state.update_user(user)?;

        let snapshot = ctx.state.read();
        if let Some(channel) = snapshot.get_channel(channel_id) {
            let mut channel = (*channel).clone();
            channel.users.entry(user_id).or_insert_with(String::new);
            ctx.state.update_channel(channel)?;
        }
        Ok(())
    }

    fn on_part(&self, ctx: &ListenerCtx<'_>, cmd: &Message, channels: &[String]) -> Result<(), StateError> {
        let Some(nick) = sender_nick(cmd) else { return Ok(()) };
        let snapshot = ctx.state.read();
        let Some(user) = snapshot.get_user_by_nick(nick) else { return Ok(()) };
        let is_self = snapshot.self_user().is_some_and(|u| u.id == user.id);

        for name in channels {
            let Some(channel) = snapshot.get_channel_by_name(name) else { continue };
            if is_self {
                ctx.state.remove_channel(channel.id);
            } else {
                ctx.state.remove_membership(user.id, channel.id);
            }
        }
        Ok(())
    }

    fn on_kick(&self, ctx: &ListenerCtx<'_>, channel_name: &str, kicked_nick: &str) -> Result<(), StateError> {
        let snapshot = ctx.state.read();
        let Some(channel) = snapshot.get_channel_by_name(channel_name) else { return Ok(()) };
        let Some(user) = snapshot.get_user_by_nick(kicked_nick) else { return Ok(()) };
        let is_self = snapshot.self_user().is_some_and(|u| u.id == user.id);

        if is_self {
            ctx.state.remove_channel(channel.id);
        } else {
            ctx.state.remove_membership(user.id, channel.id);
        }
        Ok(())
    }

    fn on_quit(&self, ctx: &ListenerCtx<'_>, cmd: &Message) -> Result<(), StateError> {
        let Some(nick) = sender_nick(cmd) else { return Ok(()) };
        let snapshot = ctx.state.read();
        let Some(user) = snapshot.get_user_by_nick(nick) else { return Ok(()) };
        let channel_ids: Vec<_> = user.channels.keys().copied().collect();
        for channel_id in channel_ids {
            ctx.state.remove_membership(user.id, channel_id);
        }
        Ok(())
    }

    fn on_nick(&self, ctx: &ListenerCtx<'_>, cmd: &Message, new_nick: &str) -> Result<(), StateError> {
        let Some(old_nick) = sender_nick(cmd) else { return Ok(()) };
        if validate_nickname(new_nick).is_err() {
            return Ok(());
        }
        let snapshot = ctx.state.read();
        let Some(user) = snapshot.get_user_by_nick(old_nick) else { return Ok(()) };
        let mut updated = (*user).clone();
        updated.nick = new_nick.to_owned();
        ctx.state.update_user(updated)
    }
}

/// CHGHOST / ACCOUNT / AWAY / `301` / `305` / `306`.
struct IdentityListener;

impl Listener for IdentityListener {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> HandleFuture<'a> {
        Box::pin(async move { self.dispatch(ctx, cmd).map_err(Into::into) })
    }
}

impl IdentityListener {
    fn dispatch(&self, ctx: &ListenerCtx<'_>, cmd: &Message) -> Result<(), StateError> {
        match &cmd.command {
            Command::ChgHost { ident, host } => self.on_chghost(ctx, cmd, ident, host),
            Command::Account(account) => self.on_account(ctx, cmd, account),
            Command::Away(reason) => self.on_away(ctx, cmd, reason.is_some()),
            Command::Numeric(301, args) => self.on_rpl_away(ctx, args),
            Command::Numeric(305, _) => self.on_self_away(ctx, false),
            Command::Numeric(306, _) => self.on_self_away(ctx, true),
            _ => Ok(()),
        }
    }

    fn with_user(
        &self,
        ctx: &ListenerCtx<'_>,
        nick: &str,
        f: impl FnOnce(&mut User),
    ) -> Result<(), StateError> {
        let snapshot = ctx.state.read();
        let Some(user) = snapshot.get_user_by_nick(nick) else { return Ok(()) };
        let mut updated = (*user).clone();
        f(&mut updated);
        ctx.state.update_user(updated)
    }

    fn on_chghost(&self, ctx: &ListenerCtx<'_>, cmd: &Message, ident: &str, host: &str) -> Result<(), StateError> {
        let Some(nick) = sender_nick(cmd) else { return Ok(()) };
        self.with_user(ctx, nick, |u| {
            u.ident = ident.to_owned();
            u.host = host.to_owned();
        })
    }

    fn on_account(&self, ctx: &ListenerCtx<'_>, cmd: &Message, account: &str) -> Result<(), StateError> {
        let Some(nick) = sender_nick(cmd) else { return Ok(()) };
        let account = if account == "*" { None } else { Some(account.to_owned()) };
        self.with_user(ctx, nick, |u| u.account = account)
    }

    fn on_away(&self, ctx: &ListenerCtx<'_>, cmd: &Message, away: bool) -> Result<(), StateError> {
        let Some(nick) = sender_nick(cmd) else { return Ok(()) };
        self.with_user(ctx, nick, |u| u.away = away)
    }

    fn on_rpl_away(&self, ctx: &ListenerCtx<'_>, args: &[String]) -> Result<(), StateError> {
        let Some(target) = args.first() else { return Ok(()) };
        self.with_user(ctx, target, |u| u.away = true)
    }

    fn on_self_away(&self, ctx: &ListenerCtx<'_>, away: bool) -> Result<(), StateError> {
        let snapshot = ctx.state.read();
        let Some(user) = snapshot.self_user() else { return Ok(()) };
        let mut updated = (*user).clone();
        updated.away = away;
        ctx.state.update_user(updated)
    }
}

/// `352 RPL_WHOREPLY` / `302 RPL_USERHOST`.
struct WhoWhoisListener;

impl Listener for WhoWhoisListener {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> HandleFuture<'a> {
        Box::pin(async move { self.dispatch(ctx, cmd).map_err(Into::into) })
    }
}

impl WhoWhoisListener {
    fn dispatch(&self, ctx: &ListenerCtx<'_>, cmd: &Message) -> Result<(), StateError> {
        match &cmd.command {
            Command::Numeric(352, args) => self.on_whoreply(ctx, args),
            Command::Numeric(302, args) => self.on_userhost(ctx, args),
            _ => Ok(()),
        }
    }

    /// `<client> <channel> <user> <host> <server> <nick> <H|G>[*][prefixes] :<hopcount> <realname>`
    fn on_whoreply(&self, ctx: &ListenerCtx<'_>, args: &[String]) -> Result<(), StateError> {
        if args.len() < 8 {
            return Ok(());
        }
        let (user_part, host, nick, flags) = (&args[2], &args[3], &args[5], &args[6]);
        let realname = args[7].splitn(2, ' ').nth(1).unwrap_or("").to_owned();

        let mut chars = flags.chars();
        let away = matches!(chars.next(), Some('G'));
        let mut rest: String = chars.collect();
        if rest.starts_with('*') {
            rest.remove(0);
        }
        let prefixes = rest;

        let snapshot = ctx.state.read();
        let mut user = snapshot
            .get_user_by_nick(nick)
            .map(|u| (*u).clone())
            .unwrap_or_else(|| User::new(nick.clone(), user_part.clone(), host.clone()));
        user.ident = user_part.clone();
        user.host = host.clone();
        user.realname = realname;
        user.away = away;
        let user_id = user.id;
        ctx.state.update_user(user)?;

        if !prefixes.is_empty() {
            // Channel is only known from context in full WHOX replies; the
            // plain 352 form gives us a channel name in args[1].
            if let Some(channel) = ctx.state.read().get_channel_by_name(&args[1]) {
                let mut channel = (*channel).clone();
                channel.users.insert(user_id, prefixes);
                ctx.state.update_channel(channel)?;
            }
        }
        Ok(())
    }

    /// `<nick1>[*]=<+|->host1 ...`
    fn on_userhost(&self, ctx: &ListenerCtx<'_>, args: &[String]) -> Result<(), StateError> {
        let Some(reply) = args.last() else { return Ok(()) };
        for entry in reply.split_whitespace() {
            let Some(eq) = entry.find('=') else { continue };
            let mut nick = entry[..eq].to_owned();
            if nick.ends_with('*') {
                nick.pop();
            }
            let rest = &entry[eq + 1..];
            if rest.is_empty() {
                continue;
            }
            let (sign, host) = rest.split_at(1);
            let away = sign == "-";
            let snapshot = ctx.state.read();
            let Some(user) = snapshot.get_user_by_nick(&nick) else { continue };
            let mut updated = (*user).clone();
            updated.away = away;
            updated.host = host.to_owned();
            ctx.state.update_user(updated)?;
        }
        Ok(())
    }
}

/// `353 RPL_NAMREPLY` / `332 RPL_TOPIC`.
struct NamesTopicListener;

impl Listener for NamesTopicListener {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> HandleFuture<'a> {
        Box::pin(async move { self.dispatch(ctx, cmd).map_err(Into::into) })
    }
}

impl NamesTopicListener {
    fn dispatch(&self, ctx: &ListenerCtx<'_>, cmd: &Message) -> Result<(), StateError> {
        match &cmd.command {
            Command::Numeric(353, args) => self.on_names(ctx, args),
            Command::Numeric(332, args) => self.on_topic(ctx, args),
            _ => Ok(()),
        }
    }

    /// `<client> <symbol> <channel> :[prefix]nick ...` — requires
    /// `userhost-in-names` for full hostmasks; without it we still get bare
    /// prefixed nicks, which is all this parses.
    fn on_names(&self, ctx: &ListenerCtx<'_>, args: &[String]) -> Result<(), StateError> {
        let [_client, _symbol, channel_name, members] = args else { return Ok(()) };
        let snapshot = ctx.state.read();
        let Some(channel) = snapshot.get_channel_by_name(channel_name) else { return Ok(()) };
        let prefix_symbols = snapshot.prefix.symbols.clone();
        let mut channel = (*channel).clone();

        for token in members.split_whitespace() {
            let (prefix, rest) = split_name_prefix(token, &prefix_symbols);
            let (nick, ident, host) = split_userhost_in_names(rest);

            let mut user = ctx
                .state
                .read()
                .get_user_by_nick(nick)
                .map(|u| (*u).clone())
                .unwrap_or_else(|| User::new(nick, ident.clone(), host.clone()));
            if !ident.is_empty() {
                user.ident = ident;
            }
            if !host.is_empty() {
                user.host = host;
            }
            let user_id = user.id;
            ctx.state.update_user(user)?;
            channel.users.insert(user_id, prefix.to_owned());
        }

        ctx.state.update_channel(channel)
    }

    fn on_topic(&self, ctx: &ListenerCtx<'_>, args: &[String]) -> Result<(), StateError> {
        let [_, channel_name, topic] = args else { return Ok(()) };
        let snapshot = ctx.state.read();
        let Some(channel) = snapshot.get_channel_by_name(channel_name) else { return Ok(()) };
        let mut channel = (*channel).clone();
        channel.topic = Some(topic.clone());
        ctx.state.update_channel(channel)
    }
}

fn split_name_prefix<'a>(token: &'a str, prefix_symbols: &str) -> (&'a str, &'a str) {
    let prefix_len = token
        .chars()
        .take_while(|c| prefix_symbols.contains(*c))
        .count();
    token.split_at(prefix_len)
}

/// With `userhost-in-names`, each entry is `nick!user@host`; without, it's
/// a bare nick.
fn split_userhost_in_names(entry: &str) -> (&str, String, String) {
    match entry.find('!') {
        Some(bang) => {
            let nick = &entry[..bang];
            let rest = &entry[bang + 1..];
            match rest.find('@') {
                Some(at) => (nick, rest[..at].to_owned(), rest[at + 1..].to_owned()),
                None => (nick, rest.to_owned(), String::new()),
            }
        }
        None => (entry, String::new(), String::new()),
    }
}

/// `221 RPL_UMODEIS` / `MODE`.
struct ModeListener;

impl Listener for ModeListener {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> HandleFuture<'a> {
        Box::pin(async move { self.dispatch(ctx, cmd) })
    }
}

impl ModeListener {
    fn dispatch(&self, ctx: &ListenerCtx<'_>, cmd: &Message) -> Result<(), ListenerError> {
        match &cmd.command {
            Command::Numeric(221, args) => self.on_umodeis(ctx, args).map_err(Into::into),
            Command::Mode { target, modestring, args } => {
                self.on_mode(ctx, target, modestring.as_deref().unwrap_or(""), args)
            }
            _ => Ok(()),
        }
    }

    fn on_umodeis(&self, ctx: &ListenerCtx<'_>, args: &[String]) -> Result<(), StateError> {
        let Some(modestring) = args.last() else { return Ok(()) };
        let snapshot = ctx.state.read();
        let Some(user) = snapshot.self_user() else { return Ok(()) };
        let mut updated = (*user).clone();
        updated.modes.clear();
        for (sign, letter) in walk_user_modes(modestring) {
            match sign {
                Sign::Plus => {
                    updated.modes.insert(letter);
                }
                Sign::Minus => {
                    updated.modes.remove(&letter);
                }
            }
        }
        ctx.state.update_user(updated)
    }

    fn on_mode(
        &self,
        ctx: &ListenerCtx<'_>,
        target: &str,
        modestring: &str,
        args: &[String],
    ) -> Result<(), ListenerError> {
        let snapshot = ctx.state.read();
        let is_self_target = snapshot
            .self_user()
            .is_some_and(|u| u.nick.eq_ignore_ascii_case(target));

        if is_self_target {
            let Some(user) = snapshot.self_user() else { return Ok(()) };
            let mut updated = (*user).clone();
            for (sign, letter) in walk_user_modes(modestring) {
                match sign {
                    Sign::Plus => {
                        updated.modes.insert(letter);
                    }
                    Sign::Minus => {
                        updated.modes.remove(&letter);
                    }
                }
            }
            return ctx.state.update_user(updated).map_err(Into::into);
        }

        let Some(channel) = snapshot.get_channel_by_name(target) else { return Ok(()) };
        let chanmodes = crate::isupport::ChanModes {
            a: &snapshot.chanmodes.a,
            b: &snapshot.chanmodes.b,
            c: &snapshot.chanmodes.c,
            d: &snapshot.chanmodes.d,
        };
        let prefix = crate::isupport::PrefixSpec {
            modes: &snapshot.prefix.modes,
            prefixes: &snapshot.prefix.symbols,
        };
        let effects = walk_channel_modes(modestring, args, &chanmodes, &prefix)
            .map_err(|e| ListenerWarning(format!("mode walk failed for {target}: {e}")))?;

        let mut channel = (*channel).clone();
        for effect in effects {
            match effect {
                ChannelModeEffect::Prefix { sign, letter, nick } => {
                    let prefix_idx = snapshot.prefix.modes.find(letter);
                    let Some(idx) = prefix_idx else { continue };
                    let symbol = snapshot.prefix.symbols.chars().nth(idx).unwrap_or(letter);
                    if let Some(user) = snapshot.get_user_by_nick(&nick) {
                        let symbols = channel.users.entry(user.id).or_insert_with(String::new);
                        match sign {
                            Sign::Plus => {
                                if !symbols.contains(symbol) {
                                    symbols.push(symbol);
                                }
                            }
                            Sign::Minus => symbols.retain(|c| c != symbol),
                        }
                    }
                }
                ChannelModeEffect::Set { sign, letter, arg } => match sign {
                    Sign::Plus => {
                        channel.modes.insert(letter, Some(arg));
                    }
                    Sign::Minus => {
                        channel.modes.remove(&letter);
                    }
                },
                ChannelModeEffect::SetOptional { sign, letter, arg } => match sign {
                    Sign::Plus => {
                        channel.modes.insert(letter, arg);
                    }
                    Sign::Minus => {
                        channel.modes.remove(&letter);
                    }
                },
                ChannelModeEffect::Flag { sign, letter } => match sign {
                    Sign::Plus => {
                        channel.modes.insert(letter, None);
                    }
                    Sign::Minus => {
                        channel.modes.remove(&letter);
                    }
                },
                ChannelModeEffect::List { .. } => {
                    // Ban/except/invex lists are out of scope (spec §4.4).
                }
            }
        }
        ctx.state.update_channel(channel).map_err(Into::into)
    }
}

/// `RENAME` (`draft/channel-rename`) / `SETNAME`.
struct RenameSetNameListener;

impl Listener for RenameSetNameListener {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> HandleFuture<'a> {
        Box::pin(async move { self.dispatch(ctx, cmd).map_err(Into::into) })
    }
}

impl RenameSetNameListener {
    fn dispatch(&self, ctx: &ListenerCtx<'_>, cmd: &Message) -> Result<(), StateError> {
        match &cmd.command {
            Command::Rename { channel, new_name, .. } => self.on_rename(ctx, channel, new_name),
            Command::SetName(realname) => self.on_setname(ctx, cmd, realname),
            _ => Ok(()),
        }
    }

    fn on_rename(&self, ctx: &ListenerCtx<'_>, channel_name: &str, new_name: &str) -> Result<(), StateError> {
        let snapshot = ctx.state.read();
        let Some(channel) = snapshot.get_channel_by_name(channel_name) else { return Ok(()) };
        let mut updated = (*channel).clone();
        updated.name = new_name.to_owned();
        ctx.state.update_channel(updated)
    }

    fn on_setname(&self, ctx: &ListenerCtx<'_>, cmd: &Message, realname: &str) -> Result<(), StateError> {
        let Some(nick) = sender_nick(cmd) else { return Ok(()) };
        let snapshot = ctx.state.read();
        let Some(user) = snapshot.get_user_by_nick(nick) else { return Ok(()) };
        let mut updated = (*user).clone();
        updated.realname = realname.to_owned();
        ctx.state.update_user(updated)
    }
}

/// `PING` / `ERROR`.
struct PingErrorListener;

impl Listener for PingErrorListener {
    fn handle<'a>(&'a self, ctx: &'a ListenerCtx<'a>, cmd: &'a Message) -> HandleFuture<'a> {
        Box::pin(async move {
            match &cmd.command {
                Command::Ping(token) => {
                    ctx.send(Message::new(Command::Pong(token.clone())));
                }
                Command::Error(reason) => {
                    tracing::warn!(%reason, "server sent ERROR");
                }
                _ => {}
            }
            Ok(())
        })
    }
}
