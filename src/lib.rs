//! # netwolf-client
//!
//! A client-side IRC transport and bot framework with full IRCv3 support.
//!
//! ## Layout
//!
//! - [`message`]/[`command`]/[`prefix`]/[`casemap`]/[`mode`]/[`isupport`] —
//!   the wire codec: parsing, serializing, and case-folding IRC messages.
//! - [`caps`]/[`sasl`]/[`ircv3`] — capability negotiation and SASL
//!   authentication mechanisms.
//! - [`state`] — the atomic-snapshot network state store.
//! - [`transport`] — TCP/TLS connection handling (`net` feature).
//! - [`splitter`] — UAX #14 line splitting for outbound message text.
//! - [`ratelimit`] — the partitioned outbound rate-limit chain.
//! - [`listeners`] — the incoming-command listener catalog.
//! - [`engine`] — the registration handshake, SASL driver, OPER/CHALLENGE,
//!   and the per-connection message loop (`net` feature).
//! - [`bot`] — command dispatch and the bot startup sequence, built on
//!   [`engine`] (`net` feature).
//! - [`config`] — network and bot configuration, with optional TOML
//!   loading (`config-toml` feature).
//!
//! ## Quick start
//!
//! ```rust
//! use netwolf_client::Message;
//!
//! let privmsg = Message::privmsg("#rust", "Hello, world!");
//! println!("{privmsg}");
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message: Message = raw.parse().expect("valid IRC message");
//! assert!(message.tags.is_some());
//! ```

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod caps;
pub mod casemap;
pub mod command;
pub mod error;
pub mod ircv3;
pub mod isupport;
pub mod message;
pub mod mode;
pub mod prefix;
pub mod sasl;
pub mod state;
pub mod util;
pub mod validation;

#[cfg(feature = "net")]
pub mod bot;
pub mod config;
#[cfg(feature = "net")]
pub mod engine;
#[cfg(feature = "net")]
pub mod listeners;
#[cfg(feature = "net")]
pub mod ratelimit;
#[cfg(feature = "net")]
pub mod splitter;
#[cfg(feature = "net")]
pub mod transport;

pub use self::caps::Capability;
pub use self::casemap::{irc_eq, irc_to_lower, CaseMapping};
pub use self::command::Command;
pub use self::ircv3::{format_server_time, format_timestamp, generate_batch_ref, generate_msgid};
pub use self::isupport::{ChanModes, Isupport, IsupportEntry, MaxList, PrefixSpec, TargMax};
pub use self::message::{Message, Tag, Tags};
pub use self::mode::{walk_channel_modes, walk_user_modes, ChannelModeEffect, Sign};
pub use self::prefix::Prefix;
pub use self::sasl::{choose_mechanism, encode_external, encode_plain, SaslMechanism};

#[cfg(feature = "net")]
pub use self::bot::{BotRuntime, CommandContext, Dispatcher};
#[cfg(feature = "net")]
pub use self::engine::{Engine, EngineConfig, EngineHandle, EngineOutcome};
#[cfg(feature = "net")]
pub use self::transport::{Transport, TransportReadError, MAX_IRC_LINE_LEN};
