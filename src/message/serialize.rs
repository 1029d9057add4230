//! [`Message`] → wire line serialization.

use std::fmt;

use super::tags::escape_tag_value;
use super::types::Message;
use crate::util::{MAX_CLIENT_TAG_DATA, MAX_MESSAGE_BODY};

/// Write `@tags :prefix VERB args... :trailing` (no trailing CRLF; the
/// transport appends that). Returns an error only on a `fmt::Write` failure;
/// byte-limit checks are a separate, fallible pre-flight via
/// [`check_limits`].
pub(crate) fn write_message(f: &mut fmt::Formatter<'_>, msg: &Message) -> fmt::Result {
    if let Some(tags) = &msg.tags {
        if !tags.is_empty() {
            f.write_str("@")?;
            let mut first = true;
            for (k, v) in tags {
                if !first {
                    f.write_str(";")?;
                }
                first = false;
                f.write_str(k)?;
                if let Some(v) = v {
                    f.write_str("=")?;
                    escape_tag_value(f, v)?;
                }
            }
            f.write_str(" ")?;
        }
    }
    if let Some(prefix) = &msg.prefix {
        write!(f, ":{prefix} ")?;
    }
    write!(f, "{}", msg.command)
}

/// Error raised when a constructed message would exceed the wire limits in
/// spec §3.2 / §6.1: 512 bytes total (incl. CRLF), 4096 tag bytes
/// client-to-server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializeLimitError {
    #[error("command line too long: {0} bytes (limit 512 including CRLF)")]
    CommandTooLong(usize),
    #[error("tags too long: {0} bytes (limit {MAX_CLIENT_TAG_DATA})")]
    TagsTooLong(usize),
}

/// Check a fully-serialized wire line against the byte limits from spec
/// §3.2. `line` must not include the trailing CRLF (2 is added internally).
pub fn check_limits(line: &str) -> Result<(), SerializeLimitError> {
    let tag_len = if line.starts_with('@') {
        line.find(' ').unwrap_or(line.len())
    } else {
        0
    };
    if tag_len > MAX_CLIENT_TAG_DATA {
        return Err(SerializeLimitError::TagsTooLong(tag_len));
    }
    let body_len = line.len() - tag_len + 2; // + CRLF
    if body_len > MAX_MESSAGE_BODY {
        return Err(SerializeLimitError::CommandTooLong(body_len));
    }
    Ok(())
}
