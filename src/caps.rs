//! IRCv3 capability negotiation support: the client side only (spec §4.6's
//! `CapLS`/`CapReq` handshake states do the actual ACK/NAK bookkeeping; this
//! module supplies the request-side building blocks they call).
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>
//! - Individual capability specifications: <https://ircv3.net/irc/>

/// Known IRCv3 capability types, for callers that want a typed handle on a
/// well-known capability instead of matching raw strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Show all user prefix modes in NAMES
    MultiPrefix,
    /// SASL authentication
    Sasl,
    /// Notify of account login/logout
    AccountNotify,
    /// Notify of away status changes
    AwayNotify,
    /// Extended JOIN with account and realname
    ExtendedJoin,
    /// MONITOR command for presence tracking
    Monitor,
    /// Add account tag to messages
    AccountTag,
    /// Message batching
    Batch,
    /// Notify of capability changes
    CapNotify,
    /// Notify of hostname changes
    ChgHost,
    /// Echo messages back to sender
    EchoMessage,
    /// Notify of channel invites
    InviteNotify,
    /// Server-time message tags
    ServerTime,
    /// Full nick!user@host in NAMES
    UserhostInNames,
    /// SETNAME command for changing realname
    SetName,
    /// Client message tags support
    MessageTags,
    /// Unique message IDs
    Msgid,
    /// Label request/response correlation
    LabeledResponse,
    /// FAIL/WARN/NOTE standard replies
    StandardReplies,
    /// Strict Transport Security
    Sts,
    /// Unknown/custom capability
    Custom(String),
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::MultiPrefix => "multi-prefix",
            Self::Sasl => "sasl",
            Self::AccountNotify => "account-notify",
            Self::AwayNotify => "away-notify",
            Self::ExtendedJoin => "extended-join",
            Self::Monitor => "monitor",
            Self::AccountTag => "account-tag",
            Self::Batch => "batch",
            Self::CapNotify => "cap-notify",
            Self::ChgHost => "chghost",
            Self::EchoMessage => "echo-message",
            Self::InviteNotify => "invite-notify",
            Self::ServerTime => "server-time",
            Self::UserhostInNames => "userhost-in-names",
            Self::SetName => "setname",
            Self::MessageTags => "message-tags",
            Self::Msgid => "msgid",
            Self::LabeledResponse => "labeled-response",
            Self::StandardReplies => "standard-replies",
            Self::Sts => "sts",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "multi-prefix" => Self::MultiPrefix,
            "sasl" => Self::Sasl,
            "account-notify" => Self::AccountNotify,
            "away-notify" => Self::AwayNotify,
            "extended-join" => Self::ExtendedJoin,
            "monitor" => Self::Monitor,
            "account-tag" => Self::AccountTag,
            "batch" => Self::Batch,
            "cap-notify" => Self::CapNotify,
            "chghost" => Self::ChgHost,
            "echo-message" => Self::EchoMessage,
            "invite-notify" => Self::InviteNotify,
            "server-time" => Self::ServerTime,
            "userhost-in-names" => Self::UserhostInNames,
            "setname" => Self::SetName,
            "message-tags" => Self::MessageTags,
            "msgid" => Self::Msgid,
            "labeled-response" => Self::LabeledResponse,
            "standard-replies" => Self::StandardReplies,
            "sts" => Self::Sts,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Capabilities requested by default, when the server advertises them,
/// subject to an application-supplied `CapFilter` adding more (spec §4.6).
/// Spelled exactly as they appear on the wire (some are `draft/`-namespaced).
pub const DEFAULT_REQUEST_CAPS: &[&str] = &[
    "account-notify",
    "away-notify",
    "batch",
    "cap-notify",
    "chghost",
    "draft/channel-rename",
    "draft/multiline",
    "extended-join",
    "message-ids",
    "message-tags",
    "multi-prefix",
    "server-time",
    "setname",
    "userhost-in-names",
];

/// Compute which advertised CAPs to request: the built-in default set,
/// unioned with any CAP for which `extra` returns true, intersected with
/// what the server actually advertised.
pub fn select_request_caps(advertised: &[String], extra: impl Fn(&str) -> bool) -> Vec<String> {
    advertised
        .iter()
        .filter(|name| {
            let base = name.split('=').next().unwrap_or(name);
            DEFAULT_REQUEST_CAPS.contains(&base) || extra(base)
        })
        .cloned()
        .collect()
}

/// Split a list of CAP names into `CAP REQ :...` batches whose resulting
/// `:server CAP nick ACK :...` reply fits in 512 bytes. Spec §4.6 specifies
/// a conservative budget of `434 - nick.len() - sourcelen` bytes of CAP
/// names per batch; `sourcelen` is the server source length, unknown before
/// registration, so callers pass their best estimate (0 is safe/conservative
/// only once `nick` already accounts for the whole overhead some servers use).
pub fn batch_cap_req(caps: &[String], nick: &str, sourcelen: usize) -> Vec<String> {
    let budget = 434usize.saturating_sub(nick.len()).saturating_sub(sourcelen);
    let mut batches = Vec::new();
    let mut current = String::new();
    for cap in caps {
        let additional = if current.is_empty() {
            cap.len()
        } else {
            cap.len() + 1
        };
        if !current.is_empty() && current.len() + additional > budget {
            batches.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(cap);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_capability_as_ref() {
        assert_eq!(Capability::MultiPrefix.as_ref(), "multi-prefix");
        assert_eq!(Capability::Sasl.as_ref(), "sasl");
    }
    
    #[test]
    fn test_capability_from_str() {
        assert_eq!(Capability::from("multi-prefix"), Capability::MultiPrefix);
        assert_eq!(Capability::from("sasl"), Capability::Sasl);
        assert_eq!(
            Capability::from("unknown-cap"),
            Capability::Custom("unknown-cap".to_string())
        );
    }
    
    #[test]
    fn select_request_caps_includes_defaults_and_extras() {
        let advertised: Vec<String> = vec![
            "multi-prefix".into(),
            "sasl".into(),
            "draft/multiline".into(),
            "away-notify".into(),
        ];
        let selected = select_request_caps(&advertised, |c| c == "sasl");
        assert!(selected.contains(&"multi-prefix".to_string()));
        assert!(selected.contains(&"draft/multiline".to_string()));
        assert!(selected.contains(&"away-notify".to_string()));
        assert!(selected.contains(&"sasl".to_string()));
    }

    #[test]
    fn batch_cap_req_splits_to_fit_budget() {
        let caps: Vec<String> = (0..50).map(|i| format!("cap-name-{i}")).collect();
        let batches = batch_cap_req(&caps, "nick", 20);
        assert!(batches.len() > 1);
        for batch in &batches {
            assert!(batch.len() <= 434 - 4 - 20);
        }
    }
}

