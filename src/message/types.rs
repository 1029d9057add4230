//! Owned IRC message representation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::command::Command;
use crate::error::MessageParseError;
use crate::prefix::Prefix;

/// A single IRCv3 message tag value.
///
/// `None` means the tag was present with no `=value` (a bare flag tag);
/// this is distinct from an explicit empty value `tag=`.
pub type Tag = (String, Option<String>);

/// Ordered map of message tags, keyed by tag name (including any `vendor/`
/// prefix and client-only `+` marker).
pub type Tags = BTreeMap<String, Option<String>>;

/// A fully parsed, owned IRC protocol message.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Message {
    /// IRCv3 message tags, if any were present.
    pub tags: Option<Tags>,
    /// Message source (`:nick!user@host` or `:server`), if present.
    pub prefix: Option<Prefix>,
    /// The command and its parameters.
    pub command: Command,
}

impl Message {
    /// Construct a message with no tags or prefix.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            tags: None,
            prefix: None,
            command,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.tags
            .get_or_insert_with(Tags::new)
            .insert(key.into(), value.map(Into::into));
        self
    }

    /// Get a tag's value. Returns `Some(None)` for a bare flag tag, `None` if
    /// the tag is absent entirely.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<Option<&str>> {
        self.tags
            .as_ref()?
            .get(key)
            .map(|v| v.as_deref())
    }

    // Convenience constructors mirroring the wire verbs the engine/bot
    // runtime actually send. These exist so call sites never need to spell
    // out `Command::Privmsg { .. }` by hand.

    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Command::Privmsg {
            target: target.into(),
            text: text.into(),
        })
    }

    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Command::Notice {
            target: target.into(),
            text: text.into(),
        })
    }

    #[must_use]
    pub fn join(channel: impl Into<String>) -> Self {
        Self::new(Command::Join {
            channels: vec![channel.into()],
            keys: Vec::new(),
            extended: None,
        })
    }

    /// A client-originated `CAP` request (`LS`, `REQ`, `END`, ...) — never
    /// carries a target nick.
    #[must_use]
    pub fn cap(sub: impl Into<String>, args: Vec<String>) -> Self {
        Self::new(Command::Cap {
            target: None,
            sub: sub.into(),
            args,
        })
    }

    #[must_use]
    pub fn nick(nick: impl Into<String>) -> Self {
        Self::new(Command::Nick(nick.into()))
    }

    #[must_use]
    pub fn ping(token: impl Into<String>) -> Self {
        Self::new(Command::Ping(token.into()))
    }

    /// Serialize to a CRLF-terminated wire line.
    #[must_use]
    pub fn to_wire_line(&self) -> String {
        format!("{self}\r\n")
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::message::parse::parse_message(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::message::serialize::write_message(f, self)
    }
}
