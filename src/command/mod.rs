//! IRC command verbs and their arguments.

mod parse;
mod serialize;

use std::fmt;

/// An IRC command: an uppercase verb plus its ordered arguments.
///
/// Only variants this crate's engine, listeners, and bot runtime actually
/// construct or match against are named explicitly; every other verb
/// observed on the wire (server-operator commands, unrecognized extensions)
/// round-trips through [`Command::Raw`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    Pass(String),
    Nick(String),
    User {
        user: String,
        mode: String,
        realname: String,
    },
    Cap {
        /// The target nick (or `*` before registration) on a
        /// server-originated `CAP` reply. `None` for a client-originated
        /// `CAP` request, which carries no target component.
        target: Option<String>,
        sub: String,
        args: Vec<String>,
    },
    Authenticate(String),
    Ping(String),
    Pong(String),
    Quit(Option<String>),
    Join {
        channels: Vec<String>,
        keys: Vec<String>,
        /// `(account, realname)` from an incoming `draft/extended-join`
        /// announcement. Always `None` for a client-originated JOIN.
        extended: Option<(String, String)>,
    },
    Part {
        channels: Vec<String>,
        message: Option<String>,
    },
    Kick {
        channel: String,
        nick: String,
        comment: Option<String>,
    },
    Mode {
        target: String,
        modestring: Option<String>,
        args: Vec<String>,
    },
    Topic {
        channel: String,
        topic: Option<String>,
    },
    Names(Vec<String>),
    Who(String),
    Whois(String),
    ChgHost {
        ident: String,
        host: String,
    },
    Account(String),
    Away(Option<String>),
    SetName(String),
    Rename {
        channel: String,
        new_name: String,
        reason: Option<String>,
    },
    TagMsg(String),
    Privmsg {
        target: String,
        text: String,
    },
    Notice {
        target: String,
        text: String,
    },
    CPrivmsg {
        target: String,
        channel: String,
        text: String,
    },
    CNotice {
        target: String,
        channel: String,
        text: String,
    },
    Oper {
        name: String,
        password: String,
    },
    Challenge(String),
    Error(String),
    /// A three-digit numeric reply, e.g. `001`.
    Numeric(u16, Vec<String>),
    /// Any other verb, preserved exactly.
    Raw(String, Vec<String>),
}

impl Default for Command {
    fn default() -> Self {
        Command::Raw(String::new(), Vec::new())
    }
}

impl Command {
    /// The uppercase wire verb for this command (`"PRIVMSG"`, `"001"`, ...).
    #[must_use]
    pub fn verb(&self) -> std::borrow::Cow<'_, str> {
        self::serialize::verb(self)
    }

    /// Build a command from a wire verb and its already-split arguments.
    /// Unrecognized verbs become [`Command::Raw`].
    #[must_use]
    pub fn from_wire(verb: &str, args: Vec<String>) -> Command {
        self::parse::from_wire(verb, args)
    }

    /// Decompose back into `(verb, args)` for serialization; the inverse of
    /// [`Command::from_wire`] up to argument formatting.
    #[must_use]
    pub fn to_wire(&self) -> (std::borrow::Cow<'_, str>, Vec<String>) {
        self::serialize::to_wire(self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (verb, args) = self.to_wire();
        self::serialize::write_verb_args(f, &verb, &args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_round_trips() {
        let c = Command::from_wire("001", vec!["nick".into(), "Welcome".into()]);
        assert_eq!(c, Command::Numeric(1, vec!["nick".into(), "Welcome".into()]));
        let (verb, args) = c.to_wire();
        assert_eq!(verb, "001");
        assert_eq!(args, vec!["nick".to_string(), "Welcome".to_string()]);
    }

    #[test]
    fn unknown_verb_is_raw() {
        let c = Command::from_wire("KLINE", vec!["*@*".into()]);
        assert_eq!(c, Command::Raw("KLINE".into(), vec!["*@*".into()]));
    }

    #[test]
    fn join_with_keys_round_trips() {
        let c = Command::Join {
            channels: vec!["#a".into(), "#b".into()],
            keys: vec!["key1".into()],
            extended: None,
        };
        assert_eq!(c.to_string(), "JOIN #a,#b key1");
    }
}
