//! Integration tests for message parsing and serialization
//!
//! These tests verify that messages can be parsed from strings and then
//! serialized back to equivalent strings, ensuring round-trip compatibility.

use netwolf_client::{Command, Message, Prefix};

fn round_trip(original: &str) -> Message {
    let message: Message = original
        .parse()
        .unwrap_or_else(|e| panic!("Failed to parse '{original}': {e}"));
    let serialized = message.to_string();
    let reparsed: Message = serialized
        .parse()
        .unwrap_or_else(|e| panic!("Failed to reparse '{serialized}': {e}"));
    assert_eq!(message, reparsed, "Round-trip failed for '{original}'");
    reparsed
}

#[test]
fn test_message_round_trip_simple() {
    round_trip("PING :irc.example.com");
}

#[test]
fn test_message_round_trip_with_prefix() {
    round_trip(":nick!user@host PRIVMSG #channel :Hello, world!");
}

#[test]
fn test_message_round_trip_with_tags() {
    round_trip(
        "@time=2023-01-01T00:00:00.000Z;msgid=abc123 :nick!user@host PRIVMSG #channel :Tagged message",
    );
}

#[test]
fn test_message_round_trip_numeric_response() {
    round_trip(":server 001 nickname :Welcome to the IRC Network");
}

#[test]
fn test_message_round_trip_complex_tags() {
    round_trip(
        "@batch=abc123;msgid=def456;time=2023-01-01T12:00:00Z;+custom=value :nick BATCH +abc123 chathistory #channel",
    );
}

#[test]
fn test_message_construction_and_parsing() {
    let message = Message::new(Command::Privmsg {
        target: "#test".into(),
        text: "Integration test message".into(),
    })
    .with_prefix(Prefix::parse("testbot!test@example.com"))
    .with_tag("time", Some("2023-01-01T00:00:00Z"))
    .with_tag("msgid", Some("test123"));

    let serialized = message.to_string();
    let parsed: Message = serialized
        .parse()
        .expect("Failed to parse constructed message");
    assert_eq!(message, parsed);
}

#[test]
fn test_empty_trailing_parameter() {
    let reparsed = round_trip("PRIVMSG #channel :");
    match &reparsed.command {
        Command::Privmsg { text, .. } => assert_eq!(text, ""),
        other => panic!("Expected PRIVMSG command, got {other:?}"),
    }
}

#[test]
fn test_special_characters_in_message() {
    round_trip(":nick!user@host PRIVMSG #channel :Message with \u{fc}\u{f1}\u{ed}\u{e7}\u{f8}d\u{e9} and \u{e9}m\u{f8}j\u{ed} \u{1f389}");
}

#[test]
fn test_mode_command_round_trip() {
    round_trip(":server MODE #channel +o nick");
}

#[test]
fn test_join_command_variations() {
    for original in [
        "JOIN #channel",
        "JOIN #channel key",
        ":nick!user@host JOIN #channel",
        "JOIN #channel1,#channel2 key1,key2",
    ] {
        round_trip(original);
    }
}

#[test]
fn test_extended_join() {
    let reparsed = round_trip(":nick!user@host JOIN #channel account :Real Name");
    match &reparsed.command {
        Command::Join { channels, extended, .. } => {
            assert_eq!(channels, &vec!["#channel".to_string()]);
            assert_eq!(
                extended,
                &Some(("account".to_string(), "Real Name".to_string()))
            );
        }
        other => panic!("Expected JOIN command, got {other:?}"),
    }
}

#[test]
fn test_batch_messages() {
    for original in [
        "BATCH +abc123 chathistory #channel",
        "BATCH -abc123",
        "@batch=abc123 :server PRIVMSG #channel :Batched message",
    ] {
        round_trip(original);
    }
}

#[test]
fn test_unknown_verb_round_trips_as_raw() {
    let reparsed = round_trip("KLINE 60 *@badhost.com :Spamming");
    match &reparsed.command {
        Command::Raw(verb, args) => {
            assert_eq!(verb, "KLINE");
            assert_eq!(args, &vec!["60".to_string(), "*@badhost.com".to_string(), "Spamming".to_string()]);
        }
        other => panic!("Expected Raw command, got {other:?}"),
    }
}

#[test]
fn test_cap_request_and_reply() {
    let req = round_trip("CAP REQ :sasl multi-prefix");
    match &req.command {
        Command::Cap { target, sub, args } => {
            assert_eq!(target, &None);
            assert_eq!(sub, "REQ");
            assert_eq!(args, &vec!["sasl multi-prefix".to_string()]);
        }
        other => panic!("Expected CAP command, got {other:?}"),
    }

    let reply = round_trip(":server CAP * LS :sasl multi-prefix");
    match &reply.command {
        Command::Cap { target, sub, .. } => {
            assert_eq!(target.as_deref(), Some("*"));
            assert_eq!(sub, "LS");
        }
        other => panic!("Expected CAP command, got {other:?}"),
    }
}
