//! Comprehensive RFC 1459/2812 and IRCv3 compliance tests.
//!
//! This module tests specific edge cases and requirements from:
//! - RFC 1459: Internet Relay Chat Protocol
//! - RFC 2812: Internet Relay Chat: Client Protocol
//! - IRCv3 Message Tags: https://ircv3.net/specs/extensions/message-tags
//!
//! Run with: `cargo test --test rfc_ircv3_compliance`

use netwolf_client::message::tags::{escape_tag_value, unescape_tag_value};
use netwolf_client::{Command, Message, Prefix};

fn escape(value: &str) -> String {
    let mut out = String::new();
    escape_tag_value(&mut out, value).unwrap();
    out
}

// =============================================================================
// IRCv3 MESSAGE TAGS ESCAPING
// =============================================================================

mod tag_escaping {
    use super::*;

    #[test]
    fn test_unescape_semicolon() {
        assert_eq!(unescape_tag_value("a\\:b"), "a;b");
    }

    #[test]
    fn test_unescape_space() {
        assert_eq!(unescape_tag_value("hello\\sworld"), "hello world");
    }

    #[test]
    fn test_unescape_backslash() {
        assert_eq!(unescape_tag_value("path\\\\file"), "path\\file");
    }

    #[test]
    fn test_unescape_carriage_return() {
        assert_eq!(unescape_tag_value("line\\rend"), "line\rend");
    }

    #[test]
    fn test_unescape_line_feed() {
        assert_eq!(unescape_tag_value("line\\nend"), "line\nend");
    }

    #[test]
    fn test_unescape_combined() {
        let input = "a\\:b\\sc\\\\d\\re\\nf";
        let expected = "a;b c\\d\re\nf";
        assert_eq!(unescape_tag_value(input), expected);
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape_tag_value("test\\"), "test");
    }

    #[test]
    fn test_unescape_unknown_escape() {
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
    }

    #[test]
    fn test_escape_roundtrip() {
        let test_values = vec![
            "simple",
            "with space",
            "with;semicolon",
            "with\\backslash",
            "with\nnewline",
            "with\rcarriage",
            "complex; \\ \n \r all",
        ];

        for original in test_values {
            let escaped = escape(original);
            let unescaped = unescape_tag_value(&escaped);
            assert_eq!(
                unescaped, original,
                "Roundtrip failed: '{original}' -> '{escaped}' -> '{unescaped}'"
            );
        }
    }
}

// =============================================================================
// IRCv3 TAG PARSING IN MESSAGES
// =============================================================================

mod tag_parsing {
    use super::*;

    #[test]
    fn test_tag_with_escaped_semicolon() {
        let raw = "@key=value\\:with\\:semicolons :nick PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        assert_eq!(msg.tag("key"), Some(Some("value;with;semicolons")));
    }

    #[test]
    fn test_tag_with_escaped_spaces() {
        let raw = "@key=hello\\sworld :nick PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        assert_eq!(msg.tag("key"), Some(Some("hello world")));
    }

    #[test]
    fn test_tag_without_value() {
        let raw = "@+typing :nick PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        assert!(msg.tag("+typing").is_some());
    }

    #[test]
    fn test_multiple_tags_mixed() {
        let raw = "@+typing;time=2023-01-01T00:00:00Z;msgid=abc :nick PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        assert!(msg.tag("+typing").is_some());
        assert_eq!(msg.tag("time"), Some(Some("2023-01-01T00:00:00Z")));
        assert_eq!(msg.tag("msgid"), Some(Some("abc")));
    }

    #[test]
    fn test_client_only_tag_prefix() {
        let raw = "@+example.com/custom=value :nick PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        assert_eq!(msg.tag("+example.com/custom"), Some(Some("value")));
    }

    #[test]
    fn test_vendor_prefixed_tag() {
        let raw = "@example.com/foo=bar :nick PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        assert_eq!(msg.tag("example.com/foo"), Some(Some("bar")));
    }
}

// =============================================================================
// RFC 1459/2812 MESSAGE FORMAT
// =============================================================================

mod message_format {
    use super::*;

    #[test]
    fn test_max_line_length_512() {
        let long_text = "a".repeat(500);
        let raw = format!("PRIVMSG #ch :{long_text}\r\n");

        let msg: Message = raw.parse().expect("Should parse");
        match &msg.command {
            Command::Privmsg { text, .. } => assert_eq!(text.len(), 500),
            other => panic!("Expected PRIVMSG, got {other:?}"),
        }
    }

    #[test]
    fn test_crlf_line_ending() {
        let raw = "PING :server\r\n";
        let msg: Message = raw.parse().expect("Should parse with CRLF");
        assert_eq!(msg.command.verb(), "PING");
    }

    #[test]
    fn test_lf_only_line_ending() {
        let raw = "PING :server\n";
        let msg: Message = raw.parse().expect("Should parse with LF only");
        assert_eq!(msg.command.verb(), "PING");
    }

    #[test]
    fn test_no_line_ending() {
        let raw = "PING :server";
        let msg: Message = raw.parse().expect("Should parse without line ending");
        assert_eq!(msg.command.verb(), "PING");
    }

    #[test]
    fn test_empty_trailing_parameter() {
        let raw = "PRIVMSG #channel :";
        let msg: Message = raw.parse().expect("Should parse");
        match &msg.command {
            Command::Privmsg { target, text } => {
                assert_eq!(target, "#channel");
                assert_eq!(text, "");
            }
            other => panic!("Expected PRIVMSG, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_with_spaces() {
        let raw = ":nick PRIVMSG #ch :hello world with spaces";
        let msg: Message = raw.parse().expect("Should parse");
        match &msg.command {
            Command::Privmsg { text, .. } => assert_eq!(text, "hello world with spaces"),
            other => panic!("Expected PRIVMSG, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_preserves_leading_colon() {
        let raw = "PRIVMSG #ch ::starts with colon";
        let msg: Message = raw.parse().expect("Should parse");
        match &msg.command {
            Command::Privmsg { text, .. } => assert_eq!(text, ":starts with colon"),
            other => panic!("Expected PRIVMSG, got {other:?}"),
        }
    }

    #[test]
    fn test_numeric_command() {
        let raw = ":server 001 nick :Welcome to the network";
        let msg: Message = raw.parse().expect("Should parse");
        match &msg.command {
            Command::Numeric(code, args) => {
                assert_eq!(*code, 1);
                assert_eq!(args[0], "nick");
            }
            other => panic!("Expected numeric, got {other:?}"),
        }
    }

    #[test]
    fn test_max_params_15() {
        let raw = "CMD 1 2 3 4 5 6 7 8 9 10 11 12 13 14 :15th trailing";
        let msg: Message = raw.parse().expect("Should parse 15 params");
        match &msg.command {
            Command::Raw(verb, args) => {
                assert_eq!(verb, "CMD");
                assert_eq!(args.len(), 15);
                assert_eq!(args[14], "15th trailing");
            }
            other => panic!("Expected Raw, got {other:?}"),
        }
    }
}

// =============================================================================
// PREFIX PARSING (RFC 2812 Section 2.3.1)
// =============================================================================

mod prefix_parsing {
    use super::*;

    #[test]
    fn test_full_user_prefix() {
        let raw = ":nick!user@host.example.com PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        match &msg.prefix {
            Some(Prefix::Nick { nick, user, host }) => {
                assert_eq!(nick, "nick");
                assert_eq!(user.as_deref(), Some("user"));
                assert_eq!(host.as_deref(), Some("host.example.com"));
            }
            other => panic!("Expected Nick prefix, got {other:?}"),
        }
    }

    #[test]
    fn test_nick_at_host_prefix() {
        let raw = ":nick@host.example.com PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        assert_eq!(msg.prefix.as_ref().and_then(Prefix::nick), Some("nick"));
    }

    #[test]
    fn test_nick_only_prefix() {
        let raw = ":nick PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse");
        assert_eq!(msg.prefix.as_ref().and_then(Prefix::nick), Some("nick"));
    }

    #[test]
    fn test_server_prefix() {
        let raw = ":irc.example.com 001 nick :Welcome";
        let msg: Message = raw.parse().expect("Should parse");
        assert!(msg.prefix.is_some());
    }

    #[test]
    fn test_ipv6_host() {
        let raw = ":nick!user@2001:db8::1 PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse IPv6 host");
        assert_eq!(msg.prefix.as_ref().and_then(Prefix::nick), Some("nick"));
    }

    #[test]
    fn test_cloaked_host() {
        let raw = ":nick!user@user/nick/cloaked PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse cloaked host");
        match &msg.prefix {
            Some(Prefix::Nick { host, .. }) => assert_eq!(host.as_deref(), Some("user/nick/cloaked")),
            other => panic!("Expected Nick prefix, got {other:?}"),
        }
    }
}

// =============================================================================
// CHANNEL NAMES (RFC 2812 Section 1.3)
// =============================================================================

mod channel_names {
    use super::*;

    fn joined_channel(raw: &str) -> String {
        let msg: Message = raw.parse().expect("Should parse");
        match msg.command {
            Command::Join { channels, .. } => channels.into_iter().next().expect("at least one channel"),
            other => panic!("Expected JOIN, got {other:?}"),
        }
    }

    #[test]
    fn test_standard_channel() {
        assert_eq!(joined_channel("JOIN #channel"), "#channel");
    }

    #[test]
    fn test_local_channel() {
        assert_eq!(joined_channel("JOIN &localchan"), "&localchan");
    }

    #[test]
    fn test_channel_with_special_chars() {
        assert_eq!(joined_channel("JOIN #foo-bar_baz"), "#foo-bar_baz");
    }

    #[test]
    fn test_multiple_channels_join() {
        let msg: Message = "JOIN #chan1,#chan2,#chan3".parse().expect("Should parse");
        match msg.command {
            Command::Join { channels, .. } => {
                assert_eq!(channels, vec!["#chan1", "#chan2", "#chan3"]);
            }
            other => panic!("Expected JOIN, got {other:?}"),
        }
    }
}

// =============================================================================
// UTF-8 HANDLING (IRCv3 implies UTF-8)
// =============================================================================

mod utf8_handling {
    use super::*;

    #[test]
    fn test_utf8_in_message() {
        let raw = ":nick PRIVMSG #ch :Hello \u{4e16}\u{754c} \u{1f30d}";
        let msg: Message = raw.parse().expect("Should parse UTF-8");
        match &msg.command {
            Command::Privmsg { text, .. } => assert_eq!(text, "Hello \u{4e16}\u{754c} \u{1f30d}"),
            other => panic!("Expected PRIVMSG, got {other:?}"),
        }
    }

    #[test]
    fn test_utf8_in_nick() {
        let raw = ":\u{d1}o\u{f1}o!user@host PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse UTF-8 nick");
        assert_eq!(
            msg.prefix.as_ref().and_then(Prefix::nick),
            Some("\u{d1}o\u{f1}o")
        );
    }

    #[test]
    fn test_utf8_in_tag_value() {
        let raw = "@label=f\u{f6}\u{f6} :nick PRIVMSG #ch :hi";
        let msg: Message = raw.parse().expect("Should parse UTF-8 in tag");
        assert_eq!(msg.tag("label"), Some(Some("f\u{f6}\u{f6}")));
    }

    #[test]
    fn test_emoji_in_message() {
        let raw = ":nick PRIVMSG #ch :\u{1f389}\u{1f38a}\u{1f388}";
        let msg: Message = raw.parse().expect("Should parse emoji");
        match &msg.command {
            Command::Privmsg { text, .. } => assert_eq!(text, "\u{1f389}\u{1f38a}\u{1f388}"),
            other => panic!("Expected PRIVMSG, got {other:?}"),
        }
    }
}

// =============================================================================
// ROUND-TRIP COMPLIANCE
// =============================================================================

mod roundtrip {
    use super::*;

    fn assert_roundtrip(raw: &str) {
        let msg: Message = raw.parse().expect("Should parse");
        let serialized = msg.to_string();
        let reparsed: Message = serialized.parse().expect("Should reparse");
        assert_eq!(msg, reparsed, "Roundtrip failed for: {raw}");
    }

    #[test]
    fn test_roundtrip_simple() {
        assert_roundtrip("PING :server");
    }

    #[test]
    fn test_roundtrip_with_prefix() {
        assert_roundtrip(":nick!user@host PRIVMSG #channel :Hello world");
    }

    #[test]
    fn test_roundtrip_with_tags() {
        assert_roundtrip("@time=2023-01-01T00:00:00Z;msgid=abc :nick PRIVMSG #ch :Tagged");
    }

    #[test]
    fn test_roundtrip_empty_trailing() {
        assert_roundtrip("PRIVMSG #channel :");
    }

    #[test]
    fn test_roundtrip_numeric() {
        assert_roundtrip(":server 001 nick :Welcome to the network");
    }

    #[test]
    fn test_roundtrip_with_escaped_tags() {
        let original =
            Message::new(Command::Ping("test".to_string())).with_tag("key", Some("value;with;semicolons"));

        let serialized = original.to_string();
        let reparsed: Message = serialized.parse().expect("Should reparse");
        assert_eq!(original, reparsed);
        assert_eq!(reparsed.tag("key"), Some(Some("value;with;semicolons")));
    }
}

// =============================================================================
// COMMAND-SPECIFIC TESTS
// =============================================================================

mod commands {
    use super::*;

    #[test]
    fn test_privmsg_requires_target_and_text() {
        let msg: Message = "PRIVMSG #channel :Hello".parse().unwrap();
        match msg.command {
            Command::Privmsg { target, text } => {
                assert_eq!(target, "#channel");
                assert_eq!(text, "Hello");
            }
            other => panic!("Expected PRIVMSG, got {other:?}"),
        }
    }

    #[test]
    fn test_notice_similar_to_privmsg() {
        let msg: Message = "NOTICE #channel :Hello".parse().unwrap();
        match msg.command {
            Command::Notice { target, text } => {
                assert_eq!(target, "#channel");
                assert_eq!(text, "Hello");
            }
            other => panic!("Expected NOTICE, got {other:?}"),
        }
    }

    #[test]
    fn test_join_with_key() {
        let msg: Message = "JOIN #channel secretkey".parse().unwrap();
        match msg.command {
            Command::Join { channels, keys, .. } => {
                assert_eq!(channels, vec!["#channel".to_string()]);
                assert_eq!(keys, vec!["secretkey".to_string()]);
            }
            other => panic!("Expected JOIN, got {other:?}"),
        }
    }

    #[test]
    fn test_part_with_message() {
        let msg: Message = "PART #channel :Goodbye!".parse().unwrap();
        match msg.command {
            Command::Part { channels, message } => {
                assert_eq!(channels, vec!["#channel".to_string()]);
                assert_eq!(message, Some("Goodbye!".to_string()));
            }
            other => panic!("Expected PART, got {other:?}"),
        }
    }

    #[test]
    fn test_quit_with_message() {
        let msg: Message = "QUIT :Gone fishing".parse().unwrap();
        match msg.command {
            Command::Quit(reason) => {
                assert_eq!(reason, Some("Gone fishing".to_string()));
            }
            other => panic!("Expected QUIT, got {other:?}"),
        }
    }

    #[test]
    fn test_mode_channel() {
        let msg: Message = "MODE #channel +o nick".parse().unwrap();
        assert!(matches!(msg.command, Command::Mode { .. }));
    }

    #[test]
    fn test_kick_with_reason() {
        let msg: Message = "KICK #channel nick :Bad behavior".parse().unwrap();
        match msg.command {
            Command::Kick { channel, nick, comment } => {
                assert_eq!(channel, "#channel");
                assert_eq!(nick, "nick");
                assert_eq!(comment, Some("Bad behavior".to_string()));
            }
            other => panic!("Expected KICK, got {other:?}"),
        }
    }
}

// =============================================================================
// EDGE CASES AND ERROR HANDLING
// =============================================================================

mod edge_cases {
    use super::*;

    #[test]
    fn test_empty_message_fails() {
        let result: Result<Message, _> = "".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_whitespace_only_fails() {
        let result: Result<Message, _> = "   ".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_multiple_consecutive_spaces() {
        let raw = ":nick  PRIVMSG  #ch  :hello";
        let _ = raw.parse::<Message>();
    }

    #[test]
    fn test_very_long_nick() {
        let long_nick = "a".repeat(100);
        let raw = format!(":{long_nick}!user@host PRIVMSG #ch :hi");
        let msg: Message = raw.parse().expect("Should handle long nick");
        assert_eq!(msg.prefix.as_ref().and_then(Prefix::nick), Some(long_nick.as_str()));
    }

    #[test]
    fn test_trailing_only_colon() {
        let raw = "PRIVMSG #ch ::";
        let msg: Message = raw.parse().expect("Should parse");
        match &msg.command {
            Command::Privmsg { text, .. } => assert_eq!(text, ":"),
            other => panic!("Expected PRIVMSG, got {other:?}"),
        }
    }
}
