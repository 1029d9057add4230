//! [`Command`] → wire verb/args, and generic verb+args formatting.

use std::borrow::Cow;
use std::fmt;

use super::Command;

pub(super) fn verb(cmd: &Command) -> Cow<'_, str> {
    match cmd {
        Command::Pass(_) => "PASS".into(),
        Command::Nick(_) => "NICK".into(),
        Command::User { .. } => "USER".into(),
        Command::Cap { .. } => "CAP".into(),
        Command::Authenticate(_) => "AUTHENTICATE".into(),
        Command::Ping(_) => "PING".into(),
        Command::Pong(_) => "PONG".into(),
        Command::Quit(_) => "QUIT".into(),
        Command::Join { .. } => "JOIN".into(),
        Command::Part { .. } => "PART".into(),
        Command::Kick { .. } => "KICK".into(),
        Command::Mode { .. } => "MODE".into(),
        Command::Topic { .. } => "TOPIC".into(),
        Command::Names(_) => "NAMES".into(),
        Command::Who(_) => "WHO".into(),
        Command::Whois(_) => "WHOIS".into(),
        Command::ChgHost { .. } => "CHGHOST".into(),
        Command::Account(_) => "ACCOUNT".into(),
        Command::Away(_) => "AWAY".into(),
        Command::SetName(_) => "SETNAME".into(),
        Command::Rename { .. } => "RENAME".into(),
        Command::TagMsg(_) => "TAGMSG".into(),
        Command::Privmsg { .. } => "PRIVMSG".into(),
        Command::Notice { .. } => "NOTICE".into(),
        Command::CPrivmsg { .. } => "CPRIVMSG".into(),
        Command::CNotice { .. } => "CNOTICE".into(),
        Command::Oper { .. } => "OPER".into(),
        Command::Challenge(_) => "CHALLENGE".into(),
        Command::Error(_) => "ERROR".into(),
        Command::Numeric(code, _) => format!("{code:03}").into(),
        Command::Raw(verb, _) => verb.as_str().into(),
    }
}

pub(super) fn to_wire(cmd: &Command) -> (Cow<'_, str>, Vec<String>) {
    let v = verb(cmd);
    let args = match cmd {
        Command::Pass(p) => vec![p.clone()],
        Command::Nick(n) => vec![n.clone()],
        Command::User {
            user,
            mode,
            realname,
        } => vec![user.clone(), mode.clone(), "*".to_string(), realname.clone()],
        Command::Cap { target, sub, args } => {
            let mut v = Vec::new();
            if let Some(t) = target {
                v.push(t.clone());
            }
            v.push(sub.clone());
            v.extend(args.iter().cloned());
            v
        }
        Command::Authenticate(d) => vec![d.clone()],
        Command::Ping(t) => vec![t.clone()],
        Command::Pong(t) => vec![t.clone()],
        Command::Quit(msg) => msg.iter().cloned().collect(),
        Command::Join {
            channels,
            keys,
            extended,
        } => {
            let mut v = vec![channels.join(",")];
            if !keys.is_empty() {
                v.push(keys.join(","));
            }
            if let Some((account, realname)) = extended {
                v.push(account.clone());
                v.push(realname.clone());
            }
            v
        }
        Command::Part { channels, message } => {
            let mut v = vec![channels.join(",")];
            v.extend(message.iter().cloned());
            v
        }
        Command::Kick {
            channel,
            nick,
            comment,
        } => {
            let mut v = vec![channel.clone(), nick.clone()];
            v.extend(comment.iter().cloned());
            v
        }
        Command::Mode {
            target,
            modestring,
            args,
        } => {
            let mut v = vec![target.clone()];
            v.extend(modestring.iter().cloned());
            v.extend(args.iter().cloned());
            v
        }
        Command::Topic { channel, topic } => {
            let mut v = vec![channel.clone()];
            v.extend(topic.iter().cloned());
            v
        }
        Command::Names(chans) => {
            if chans.is_empty() {
                vec![]
            } else {
                vec![chans.join(",")]
            }
        }
        Command::Who(mask) => vec![mask.clone()],
        Command::Whois(mask) => vec![mask.clone()],
        Command::ChgHost { ident, host } => vec![ident.clone(), host.clone()],
        Command::Account(acct) => vec![acct.clone()],
        Command::Away(msg) => msg.iter().cloned().collect(),
        Command::SetName(name) => vec![name.clone()],
        Command::Rename {
            channel,
            new_name,
            reason,
        } => {
            let mut v = vec![channel.clone(), new_name.clone()];
            v.extend(reason.iter().cloned());
            v
        }
        Command::TagMsg(target) => vec![target.clone()],
        Command::Privmsg { target, text } => vec![target.clone(), text.clone()],
        Command::Notice { target, text } => vec![target.clone(), text.clone()],
        Command::CPrivmsg {
            target,
            channel,
            text,
        } => vec![target.clone(), channel.clone(), text.clone()],
        Command::CNotice {
            target,
            channel,
            text,
        } => vec![target.clone(), channel.clone(), text.clone()],
        Command::Oper { name, password } => vec![name.clone(), password.clone()],
        Command::Challenge(text) => vec![text.clone()],
        Command::Error(text) => vec![text.clone()],
        Command::Numeric(_, args) | Command::Raw(_, args) => args.clone(),
    };
    (v, args)
}

/// Write `VERB arg1 arg2 :trailing`, colon-prefixing the last argument iff
/// it is empty, contains a space, or itself begins with `:`.
pub(super) fn write_verb_args(f: &mut fmt::Formatter<'_>, verb: &str, args: &[String]) -> fmt::Result {
    f.write_str(verb)?;
    if let Some((last, rest)) = args.split_last() {
        for arg in rest {
            write!(f, " {arg}")?;
        }
        if needs_colon_prefix(last) {
            write!(f, " :{last}")?;
        } else {
            write!(f, " {last}")?;
        }
    }
    Ok(())
}

fn needs_colon_prefix(s: &str) -> bool {
    s.is_empty() || s.contains(' ') || s.starts_with(':')
}
