//! Property-based tests for IRC message parsing.
//!
//! Uses proptest to generate random IRC components and verify that:
//! 1. Parsing never panics on well-formed input
//! 2. Serialized messages can be re-parsed (roundtrip)
//! 3. Parser invariants hold across random inputs
//!
//! Run with: `cargo test --test proptest_roundtrip`

use netwolf_client::{Command, Message, Prefix};
use proptest::prelude::*;

// =============================================================================
// STRATEGIES - Generators for valid IRC components
// =============================================================================

/// Valid IRC nickname: starts with letter or special char, followed by
/// letters, digits, or special chars. Max 9 chars per RFC 2812.
fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,8}")
        .expect("valid regex")
}

/// Valid IRC username (ident): alphanumeric, no spaces or @ or !
fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9]{0,9}").expect("valid regex")
}

/// Valid hostname: simplified version
fn hostname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]+(\\.[a-z0-9]+)*").expect("valid regex")
}

/// Valid IRC channel name: starts with # or &, followed by valid chars
fn channel_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[#&][a-zA-Z0-9_\\-]{1,49}").expect("valid regex")
}

/// Message text that doesn't contain CR/LF/NUL (which would break IRC
/// protocol) or a leading space (which would be swallowed as a separator
/// on the non-trailing parameters this strategy feeds into `Command::Raw`
/// reconstitution) — PRIVMSG/NOTICE text is always the trailing parameter
/// so it can freely contain spaces.
fn message_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,400}").expect("valid regex")
}

/// Tag key: alphanumeric with optional vendor prefix
fn tag_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9\\-]{0,30}").expect("valid regex")
}

/// Tag value: no spaces, semicolons, NUL, CR, LF, or backslash (simplified)
fn tag_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9._\\-]{1,200}").expect("valid regex")
}

/// Generate a valid Prefix
fn prefix_strategy() -> impl Strategy<Value = Prefix> {
    prop_oneof![
        // Server name (contains dot)
        prop::string::string_regex("[a-z]+\\.[a-z]+\\.[a-z]+")
            .expect("valid regex")
            .prop_map(Prefix::Server),
        // User prefix: nick!user@host
        (nickname_strategy(), username_strategy(), hostname_strategy()).prop_map(
            |(nick, user, host)| Prefix::Nick {
                nick,
                user: Some(user),
                host: Some(host),
            }
        ),
    ]
}

/// Generate a (key, Option<value>) tag pair.
fn tag_strategy() -> impl Strategy<Value = (String, Option<String>)> {
    (tag_key_strategy(), prop::option::of(tag_value_strategy()))
}

/// Generate simple commands that are easy to roundtrip.
fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        (channel_strategy(), message_text_strategy())
            .prop_map(|(target, text)| Command::Privmsg { target, text }),
        (channel_strategy(), message_text_strategy())
            .prop_map(|(target, text)| Command::Notice { target, text }),
        nickname_strategy().prop_map(Command::Nick),
        channel_strategy().prop_map(|channel| Command::Join {
            channels: vec![channel],
            keys: Vec::new(),
            extended: None,
        }),
        (channel_strategy(), prop::option::of(message_text_strategy()))
            .prop_map(|(channel, message)| Command::Part {
                channels: vec![channel],
                message,
            }),
        hostname_strategy().prop_map(Command::Ping),
        hostname_strategy().prop_map(Command::Pong),
        prop::option::of(message_text_strategy()).prop_map(Command::Quit),
        prop::option::of(message_text_strategy()).prop_map(Command::Away),
        (channel_strategy(), prop::option::of(message_text_strategy()))
            .prop_map(|(channel, topic)| Command::Topic { channel, topic }),
        (
            channel_strategy(),
            nickname_strategy(),
            prop::option::of(message_text_strategy())
        )
            .prop_map(|(channel, nick, comment)| Command::Kick {
                channel,
                nick,
                comment,
            }),
        channel_strategy().prop_map(Command::Who),
        nickname_strategy().prop_map(Command::Whois),
    ]
}

/// Generate a complete valid Message.
fn message_strategy() -> impl Strategy<Value = Message> {
    (
        prop::option::of(prop::collection::vec(tag_strategy(), 0..5)),
        prop::option::of(prefix_strategy()),
        command_strategy(),
    )
        .prop_map(|(tags, prefix, command)| {
            let mut msg = Message::new(command);
            if let Some(prefix) = prefix {
                msg = msg.with_prefix(prefix);
            }
            for (key, value) in tags.into_iter().flatten() {
                msg = msg.with_tag(key, value);
            }
            msg
        })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// The fundamental roundtrip property: parse -> serialize -> parse = identity
    #[test]
    fn message_roundtrip(msg in message_strategy()) {
        let serialized = msg.to_string();
        let parsed: Message = serialized.parse()
            .expect("Serialized message should be parseable");
        prop_assert_eq!(&msg, &parsed,
            "Roundtrip failed for serialized: {}", serialized);
    }

    /// Prefix roundtrip: any valid prefix can be parsed and re-serialized
    #[test]
    fn prefix_roundtrip(prefix in prefix_strategy()) {
        let serialized = prefix.to_string();
        let parsed = Prefix::parse(&serialized);
        prop_assert_eq!(&prefix, &parsed,
            "Prefix roundtrip failed for: {}", serialized);
    }

    /// Tags should serialize in a way that can be parsed back
    #[test]
    fn tag_in_message_roundtrip(
        key in tag_key_strategy(),
        value in prop::option::of(tag_value_strategy())
    ) {
        let msg = Message::new(Command::Ping("test".to_string()))
            .with_tag(key.clone(), value.clone());

        let serialized = msg.to_string();
        let parsed: Message = serialized.parse()
            .expect("Tagged message should parse");

        let parsed_value = parsed.tag(&key).flatten();
        prop_assert_eq!(value.as_deref(), parsed_value,
            "Tag value mismatch for key '{}': expected {:?}, got {:?}",
            key, value, parsed_value);
    }

    /// PRIVMSG with arbitrary (valid) content should roundtrip
    #[test]
    fn privmsg_roundtrip(
        nick in nickname_strategy(),
        user in username_strategy(),
        host in hostname_strategy(),
        target in channel_strategy(),
        text in message_text_strategy()
    ) {
        let msg = Message::new(Command::Privmsg { target, text }).with_prefix(Prefix::Nick {
            nick,
            user: Some(user),
            host: Some(host),
        });

        let serialized = msg.to_string();
        let parsed: Message = serialized.parse()
            .expect("PRIVMSG should parse");

        prop_assert_eq!(msg, parsed);
    }

    /// Parsing should never panic on syntactically valid IRC lines
    #[test]
    fn parse_never_panics_on_valid_input(msg in message_strategy()) {
        let serialized = msg.to_string();
        let _ = serialized.parse::<Message>();
    }

    /// Nickname parser extracts correct nick from full prefix
    #[test]
    fn source_nickname_extraction(
        nick in nickname_strategy(),
        user in username_strategy(),
        host in hostname_strategy()
    ) {
        let msg = Message::new(Command::Ping("test".to_string())).with_prefix(Prefix::Nick {
            nick: nick.clone(),
            user: Some(user),
            host: Some(host),
        });

        prop_assert_eq!(msg.prefix.as_ref().and_then(Prefix::nick), Some(nick.as_str()));
    }
}

// =============================================================================
// EDGE CASE TESTS
// =============================================================================

proptest! {
    /// Empty message text should be handled correctly
    #[test]
    fn empty_message_text_roundtrip(target in channel_strategy()) {
        let msg = Message::new(Command::Privmsg { target, text: String::new() });

        let serialized = msg.to_string();
        let parsed: Message = serialized.parse().expect("Should parse");
        prop_assert_eq!(msg, parsed);
    }

    /// Multiple tags should maintain their keys and values
    #[test]
    fn multiple_tags_roundtrip(tags in prop::collection::vec(tag_strategy(), 1..5)) {
        let mut msg = Message::new(Command::Ping("test".to_string()));
        for (key, value) in &tags {
            msg = msg.with_tag(key.clone(), value.clone());
        }

        let serialized = msg.to_string();
        let parsed: Message = serialized.parse().expect("Should parse");

        for (key, value) in &tags {
            let parsed_value = parsed.tag(key).flatten();
            prop_assert_eq!(value.as_deref(), parsed_value,
                "Tag {:?} not found/matched in parsed message", key);
        }
    }
}
