//! Wire verb/args → [`Command`] construction.

use super::Command;

/// Construct a [`Command`] from an uppercased-or-not verb and its arguments.
/// Arity/shape mismatches fall back to [`Command::Raw`] rather than erroring;
/// the codec's job is to preserve the line, not to validate application
/// semantics (that's the listener catalog's job).
pub(super) fn from_wire(verb: &str, mut args: Vec<String>) -> Command {
    let upper = verb.to_ascii_uppercase();

    if upper.len() == 3 && upper.bytes().all(|b| b.is_ascii_digit()) {
        let code: u16 = upper.parse().unwrap_or(0);
        return Command::Numeric(code, args);
    }

    macro_rules! raw {
        () => {
            return Command::Raw(upper, args)
        };
    }

    match upper.as_str() {
        "PASS" if args.len() == 1 => Command::Pass(args.remove(0)),
        "NICK" if args.len() == 1 => Command::Nick(args.remove(0)),
        "USER" if args.len() == 4 => {
            let realname = args.remove(3);
            let mode = args.remove(1);
            let user = args.remove(0);
            Command::User {
                user,
                mode,
                realname,
            }
        }
        // A client-originated CAP request is bare (`CAP REQ :...`); a
        // server-originated CAP reply is prefixed with the target nick (or
        // `*` before registration settles one): `CAP * LS :...`. The wire
        // never overloads a subcommand keyword as a nick, so checking
        // `args[0]` against the known subcommand set disambiguates direction.
        "CAP" if !args.is_empty() => {
            const SUBCOMMANDS: &[&str] =
                &["LS", "LIST", "REQ", "ACK", "NAK", "NEW", "DEL", "END"];
            if SUBCOMMANDS.contains(&args[0].to_ascii_uppercase().as_str()) {
                let sub = args.remove(0);
                Command::Cap {
                    target: None,
                    sub,
                    args,
                }
            } else if args.len() >= 2 {
                let target = args.remove(0);
                let sub = args.remove(0);
                Command::Cap {
                    target: Some(target),
                    sub,
                    args,
                }
            } else {
                raw!()
            }
        }
        "AUTHENTICATE" if args.len() == 1 => Command::Authenticate(args.remove(0)),
        "PING" if args.len() == 1 => Command::Ping(args.remove(0)),
        "PONG" if !args.is_empty() => Command::Pong(args.remove(args.len() - 1)),
        "QUIT" => Command::Quit(if args.is_empty() {
            None
        } else {
            Some(args.remove(0))
        }),
        // A client-originated JOIN carries at most `chanlist,keylist` (2
        // args). 3+ args can only be a server announcement of a single
        // channel join under `draft/extended-join` (channel, account,
        // realname) — the wire grammar never produces a 3rd JOIN arg
        // otherwise.
        "JOIN" if args.len() >= 3 => {
            let channel = args.remove(0);
            let account = args.remove(0);
            let realname = args.remove(0);
            Command::Join {
                channels: vec![channel],
                keys: Vec::new(),
                extended: Some((account, realname)),
            }
        }
        "JOIN" if !args.is_empty() => {
            let channels = args[0].split(',').map(str::to_string).collect();
            let keys = args
                .get(1)
                .map(|k| k.split(',').map(str::to_string).collect())
                .unwrap_or_default();
            Command::Join {
                channels,
                keys,
                extended: None,
            }
        }
        "PART" if !args.is_empty() => {
            let channels = args[0].split(',').map(str::to_string).collect();
            let message = args.get(1).cloned();
            Command::Part { channels, message }
        }
        "KICK" if args.len() >= 2 => {
            let comment = args.get(2).cloned();
            Command::Kick {
                channel: args[0].clone(),
                nick: args[1].clone(),
                comment,
            }
        }
        "MODE" if !args.is_empty() => {
            let target = args.remove(0);
            let modestring = if args.is_empty() {
                None
            } else {
                Some(args.remove(0))
            };
            Command::Mode {
                target,
                modestring,
                args,
            }
        }
        "TOPIC" if !args.is_empty() => {
            let channel = args.remove(0);
            let topic = if args.is_empty() {
                None
            } else {
                Some(args.remove(0))
            };
            Command::Topic { channel, topic }
        }
        "NAMES" => Command::Names(
            args.first()
                .map(|a| a.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        ),
        "WHO" if args.len() == 1 => Command::Who(args.remove(0)),
        "WHOIS" if !args.is_empty() => Command::Whois(args.remove(args.len() - 1)),
        "CHGHOST" if args.len() == 2 => Command::ChgHost {
            ident: args.remove(0),
            host: args.remove(0),
        },
        "ACCOUNT" if args.len() == 1 => Command::Account(args.remove(0)),
        "AWAY" => Command::Away(if args.is_empty() {
            None
        } else {
            Some(args.remove(0))
        }),
        "SETNAME" if args.len() == 1 => Command::SetName(args.remove(0)),
        "RENAME" if args.len() >= 2 => {
            let reason = args.get(2).cloned();
            Command::Rename {
                channel: args[0].clone(),
                new_name: args[1].clone(),
                reason,
            }
        }
        "TAGMSG" if args.len() == 1 => Command::TagMsg(args.remove(0)),
        "PRIVMSG" if args.len() == 2 => Command::Privmsg {
            target: args.remove(0),
            text: args.remove(0),
        },
        "NOTICE" if args.len() == 2 => Command::Notice {
            target: args.remove(0),
            text: args.remove(0),
        },
        "CPRIVMSG" if args.len() == 3 => Command::CPrivmsg {
            target: args.remove(0),
            channel: args.remove(0),
            text: args.remove(0),
        },
        "CNOTICE" if args.len() == 3 => Command::CNotice {
            target: args.remove(0),
            channel: args.remove(0),
            text: args.remove(0),
        },
        "OPER" if args.len() == 2 => Command::Oper {
            name: args.remove(0),
            password: args.remove(0),
        },
        "CHALLENGE" if args.len() == 1 => Command::Challenge(args.remove(0)),
        "ERROR" if args.len() == 1 => Command::Error(args.remove(0)),
        _ => raw!(),
    }
}
