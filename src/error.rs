//! Error types for the IRC protocol library.
//!
//! This module defines error types for protocol-level errors,
//! message parsing failures, and mode parsing issues.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Message exceeded maximum allowed length.
    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),

    /// Illegal control character in message.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// Failed to parse an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The raw message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// The line did not match the IRC message grammar.
    #[error("malformed line: {0}")]
    MalformedLine(String),

    /// A field contained a forbidden byte (NUL, CR, or LF mid-line).
    #[error("invalid characters in {field}")]
    InvalidCharacters {
        /// Which field contained the forbidden byte.
        field: &'static str,
    },

    /// Not enough arguments for command.
    #[error("not enough arguments: expected {expected}, got {got}")]
    NotEnoughArguments {
        /// Expected number of arguments.
        expected: usize,
        /// Actual number of arguments.
        got: usize,
    },

    /// An argument was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown command name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid mode argument.
    #[error("invalid mode argument: {0}")]
    InvalidModeArg(String),

    /// Failed to parse mode string.
    #[error("invalid mode string: {string}")]
    InvalidModeString {
        /// The raw mode string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: ModeParseError,
    },

    /// Invalid subcommand for a command.
    #[error("invalid {cmd} subcommand: {sub}")]
    InvalidSubcommand {
        /// The parent command name.
        cmd: &'static str,
        /// The invalid subcommand.
        sub: String,
    },

    /// Invalid message prefix.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// Parsing error with detailed context information.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Character position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
        /// Optional source error that caused this failure.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Preserved source error message for Clone support.
        /// When cloning, the boxed error cannot be cloned, but this field
        /// preserves the error message for debugging purposes.
        source_message: Option<String>,
    },
}

impl Clone for MessageParseError {
    fn clone(&self) -> Self {
        match self {
            MessageParseError::EmptyMessage => MessageParseError::EmptyMessage,
            MessageParseError::InvalidCommand => MessageParseError::InvalidCommand,
            MessageParseError::NotEnoughArguments { expected, got } => {
                MessageParseError::NotEnoughArguments {
                    expected: *expected,
                    got: *got,
                }
            }
            MessageParseError::MalformedLine(s) => MessageParseError::MalformedLine(s.clone()),
            MessageParseError::InvalidCharacters { field } => {
                MessageParseError::InvalidCharacters { field }
            }
            MessageParseError::InvalidArgument(s) => MessageParseError::InvalidArgument(s.clone()),
            MessageParseError::UnknownCommand(s) => MessageParseError::UnknownCommand(s.clone()),
            MessageParseError::InvalidModeArg(s) => MessageParseError::InvalidModeArg(s.clone()),
            MessageParseError::InvalidModeString { string, cause } => {
                MessageParseError::InvalidModeString {
                    string: string.clone(),
                    cause: cause.clone(),
                }
            }
            MessageParseError::InvalidSubcommand { cmd, sub } => {
                MessageParseError::InvalidSubcommand {
                    cmd,
                    sub: sub.clone(),
                }
            }
            MessageParseError::InvalidPrefix(s) => MessageParseError::InvalidPrefix(s.clone()),
            MessageParseError::ParseContext {
                position,
                context,
                source,
                source_message,
            } => {
                // We can't clone the boxed error, but we preserve the error message
                let preserved_message = source_message.clone().or_else(|| {
                    source.as_ref().map(|e| e.to_string())
                });
                MessageParseError::ParseContext {
                    position: *position,
                    context: context.clone(),
                    source: None,
                    source_message: preserved_message,
                }
            }
        }
    }
}

/// Errors encountered when parsing mode strings.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ModeParseError {
    /// Invalid mode modifier character (not + or -).
    #[error("invalid mode modifier: {modifier}")]
    InvalidModeModifier {
        /// The invalid modifier character.
        modifier: char,
    },

    /// Missing mode modifier (+ or -).
    #[error("missing mode modifier")]
    MissingModeModifier,
}

/// Errors raised by the state store when an update would violate a
/// uniqueness invariant the protocol is supposed to prevent. Per §7, this
/// category propagates through the message loop and causes disconnect.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum StateError {
    #[error("nick collision: {nick} already used by a different user")]
    NickCollision { nick: String },

    #[error("channel name collision: {name} already used by a different channel")]
    ChannelCollision { name: String },

    #[error("membership invariant violated for user {user} in channel {channel}")]
    MembershipInvariant { user: String, channel: String },
}

/// Errors from the partitioned rate-limit chain (§4.7).
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum RateLimitError {
    /// A limiter's queue was full; carries the refusing limiter's label and
    /// the partition key that was rejected.
    #[error("rate limit queue full for {limiter} (partition {partition})")]
    QueueFull {
        limiter: &'static str,
        partition: String,
    },

    /// The send was cancelled while waiting on a lease; any already-acquired
    /// leases were released.
    #[error("rate-limited send cancelled")]
    Cancelled,
}

/// Errors from the registration handshake (§4.6).
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum HandshakeError {
    #[error("both primary and secondary nick were rejected during registration")]
    NicksExhausted,

    #[error("SASL required by configuration but no mechanism succeeded")]
    SaslRequired,

    #[error("registration timed out before 001 RPL_WELCOME")]
    TimedOut,
}

/// Errors from the SASL subsystem (§4.6).
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum SaslError {
    #[error("no offerable SASL mechanism remains")]
    MechanismsExhausted,

    #[error("SASL buffer exceeded 64 KiB")]
    BufferTooLarge,

    #[error("SCRAM protocol violation: {0}")]
    ScramProtocol(String),

    #[error("fatal SASL failure (numeric {numeric})")]
    Fatal { numeric: u16 },
}

/// Errors surfaced to a JOIN/PART awaiter (§4.9).
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ChannelAwaitError {
    #[error("numeric {numeric} for channel {channel}: {detail}")]
    Numeric {
        numeric: u16,
        channel: String,
        detail: String,
    },

    #[error("await cancelled")]
    Cancelled,
}

/// Errors from the bot command dispatcher (§4.8).
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("validation failed for parameter {parameter}: {reason}")]
    Validation { parameter: String, reason: String },

    #[error("permission denied: requires {permission}")]
    PermissionDenied { permission: String },
}

/// Errors from the bot runtime's startup sequence (§4.9).
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum BotRuntimeError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error(transparent)]
    Channel(#[from] ChannelAwaitError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}
