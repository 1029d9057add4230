//! Message source (`prefix`) parsing.

use std::fmt;

/// The source of a message: either a user hostmask or a bare server name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prefix {
    /// `nick[!user][@host]` — a user or service.
    Nick {
        nick: String,
        user: Option<String>,
        host: Option<String>,
    },
    /// A bare server name, containing no `!` or `@`.
    Server(String),
}

impl Prefix {
    /// Parse a raw prefix string (without the leading `:`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.find('!') {
            Some(bang) => {
                let nick = raw[..bang].to_string();
                let rest = &raw[bang + 1..];
                match rest.find('@') {
                    Some(at) => Prefix::Nick {
                        nick,
                        user: Some(rest[..at].to_string()),
                        host: Some(rest[at + 1..].to_string()),
                    },
                    None => Prefix::Nick {
                        nick,
                        user: Some(rest.to_string()),
                        host: None,
                    },
                }
            }
            None => match raw.find('@') {
                Some(at) => Prefix::Nick {
                    nick: raw[..at].to_string(),
                    user: None,
                    host: Some(raw[at + 1..].to_string()),
                },
                // A bare token with no `!`/`@` and a `.` is conventionally a
                // server name; otherwise treat it as a nick with no
                // user/host (e.g. services pseudo-sources).
                None if raw.contains('.') => Prefix::Server(raw.to_string()),
                None => Prefix::Nick {
                    nick: raw.to_string(),
                    user: None,
                    host: None,
                },
            },
        }
    }

    /// The nick, if this prefix names a user.
    #[must_use]
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Nick { nick, .. } => Some(nick),
            Prefix::Server(_) => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Nick { nick, user, host } => {
                f.write_str(nick)?;
                if let Some(user) = user {
                    write!(f, "!{user}")?;
                }
                if let Some(host) = host {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
            Prefix::Server(name) => f.write_str(name),
        }
    }
}
