//! Wire line → [`Message`] parsing.

use super::nom_parser::ParsedMessage;
use super::tags::unescape_tag_value;
use super::types::{Message, Tags};
use crate::command::Command;
use crate::error::MessageParseError;
use crate::prefix::Prefix;

const FORBIDDEN: [char; 3] = ['\0', '\r', '\n'];

/// Parse a single IRC wire line (CRLF optional, stripped if present).
pub(crate) fn parse_message(input: &str) -> Result<Message, MessageParseError> {
    if input.is_empty() {
        return Err(MessageParseError::EmptyMessage);
    }
    if input.contains('\0') {
        return Err(MessageParseError::InvalidCharacters { field: "line" });
    }

    let trimmed = input.trim_end_matches(['\r', '\n']);
    let parsed = ParsedMessage::parse(trimmed)
        .map_err(|e| MessageParseError::MalformedLine(e.to_string()))?;

    let tags = parsed.tags.map(parse_tags).transpose()?;

    let prefix = match parsed.prefix {
        Some(p) => {
            if p.contains(' ') || p.chars().any(|c| FORBIDDEN.contains(&c)) {
                return Err(MessageParseError::InvalidCharacters { field: "prefix" });
            }
            Some(Prefix::parse(p))
        }
        None => None,
    };

    if parsed.command.is_empty()
        || !(parsed.command.bytes().all(|b| b.is_ascii_alphabetic())
            || (parsed.command.len() == 3 && parsed.command.bytes().all(|b| b.is_ascii_digit())))
    {
        return Err(MessageParseError::InvalidCommand);
    }

    for (i, arg) in parsed.params.iter().enumerate() {
        let is_trailing = i == parsed.params.len() - 1;
        if arg.chars().any(|c| FORBIDDEN.contains(&c)) {
            return Err(MessageParseError::InvalidCharacters { field: "argument" });
        }
        if !is_trailing && arg.is_empty() {
            return Err(MessageParseError::MalformedLine(
                "empty non-trailing argument".to_string(),
            ));
        }
    }

    let args: Vec<String> = parsed.params.iter().map(|s| s.to_string()).collect();
    let command = Command::from_wire(parsed.command, args);

    Ok(Message {
        tags,
        prefix,
        command,
    })
}

fn parse_tags(raw: &str) -> Result<Tags, MessageParseError> {
    let mut tags = Tags::new();
    for tag in raw.split(';') {
        if tag.is_empty() {
            continue;
        }
        let (key, value) = match tag.find('=') {
            Some(eq) => (&tag[..eq], Some(&tag[eq + 1..])),
            None => (tag, None),
        };
        if key.is_empty() {
            continue;
        }
        // Empty value normalizes to "value absent" (spec §4.1).
        let value = match value {
            Some(v) if !v.is_empty() => Some(unescape_tag_value(v)),
            _ => None,
        };
        // Later occurrence wins (spec §4.1).
        tags.insert(key.to_string(), value);
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_1_basic_privmsg() {
        let msg = parse_message(":coolguy PRIVMSG bar :lol :) ").unwrap();
        assert_eq!(msg.prefix.unwrap().nick(), Some("coolguy"));
        assert_eq!(
            msg.command,
            Command::Privmsg {
                target: "bar".into(),
                text: "lol :) ".into(),
            }
        );
    }

    #[test]
    fn scenario_2_tags() {
        let msg =
            parse_message(r"@a=b\\and\nk;c=72\s45;d=gh\:764 foo").unwrap();
        assert!(msg.prefix.is_none());
        let tags = msg.tags.unwrap();
        assert_eq!(tags.get("a").unwrap().as_deref(), Some("b\\and\nk"));
        assert_eq!(tags.get("c").unwrap().as_deref(), Some("72 45"));
        assert_eq!(tags.get("d").unwrap().as_deref(), Some("gh;764"));
        assert_eq!(msg.command, Command::Raw("FOO".into(), vec![]));
    }

    #[test]
    fn duplicate_tag_last_wins() {
        let msg = parse_message("@tag1=1;tag1=5 CMD").unwrap();
        assert_eq!(
            msg.tags.unwrap().get("tag1").unwrap().as_deref(),
            Some("5")
        );
    }

    #[test]
    fn missing_vs_empty_tag_value_equivalence() {
        let a = parse_message("@c CMD").unwrap();
        let b = parse_message("@c= CMD").unwrap();
        assert_eq!(a.tags.unwrap().get("c").unwrap(), &None);
        assert_eq!(b.tags.unwrap().get("c").unwrap(), &None);
    }

    #[test]
    fn rejects_nul() {
        assert!(parse_message("PRIVMSG #a :hi\0there").is_err());
    }
}
