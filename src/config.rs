//! Bot and network configuration (spec §6.2).
//!
//! [`NetworkConfig`] collects everything [`crate::engine`] and
//! [`crate::bot::runtime`] need for one network: server list, identity,
//! SASL, timers, TLS, the channel join list, oper credentials, and rate
//! limiting. Deserializable with `serde`; TOML loading is gated behind the
//! `config-toml` feature so the bare crate never forces a TOML dependency
//! on callers who build configuration by hand.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Errors loading a [`NetworkConfig`] from disk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "config-toml")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One server in the connection order, tried in turn until one succeeds.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct ServerEntry {
    pub host: String,
    pub port: u16,
    /// `None` means auto-detect from `port` (6697 and 9999 default to TLS).
    #[cfg_attr(feature = "serde", serde(default))]
    pub tls: Option<bool>,
}

impl ServerEntry {
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        self.tls.unwrap_or(matches!(self.port, 6697 | 9999))
    }
}

/// A channel to join at startup, with an optional key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    pub name: String,
    pub key: Option<String>,
}

impl ChannelEntry {
    /// Parse `"#name"` or `"#name key"`.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(' ') {
            Some((name, key)) => Self {
                name: name.to_string(),
                key: Some(key.to_string()),
            },
            None => Self {
                name: spec.to_string(),
                key: None,
            },
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for ChannelEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// How the bot authenticates, beyond plain SASL account/password.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AuthType {
    #[default]
    Sasl,
    NickServ,
    None,
}

/// A single per-target or per-command token-bucket/sliding-window limit
/// (spec §6.2's `RateLimiterMaxCommands`/`RateLimiterMaxBytes`-style
/// entries). `window` and `limit` describe a sliding window; a bot that
/// wants a token bucket instead configures `replenish_*` alongside
/// `max_tokens`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct LimiterSpec {
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_tokens: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default, with = "duration_secs_opt"))]
    pub replenish_period: Option<Duration>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub replenish_amount: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default, with = "duration_secs_opt"))]
    pub window: Option<Duration>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub limit: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub segments: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default = "default_queue_max"))]
    pub queue_max: usize,
}

fn default_queue_max() -> usize {
    64
}

impl LimiterSpec {
    #[must_use]
    pub fn as_token_bucket(&self) -> Option<crate::ratelimit::TokenBucketConfig> {
        Some(crate::ratelimit::TokenBucketConfig {
            max_tokens: self.max_tokens?,
            replenish_period: self.replenish_period?,
            replenish_amount: self.replenish_amount?,
            queue_max: self.queue_max,
        })
    }

    #[must_use]
    pub fn as_sliding_window(&self) -> Option<crate::ratelimit::SlidingWindowConfig> {
        Some(crate::ratelimit::SlidingWindowConfig {
            duration: self.window?,
            limit: self.limit?,
            segments: self.segments.unwrap_or(10),
            queue_max: self.queue_max,
        })
    }
}

/// Rate-limit chain configuration (spec §4.7/§6.2). Each component is
/// optional; an absent one is disabled.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct RateLimiterConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub default_per_target: Option<LimiterSpec>,
    /// Overrides for `default_per_target`, keyed by exact target name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub per_target: HashMap<String, LimiterSpec>,
    /// Keyed by `` VERB`arity ``, e.g. `` PRIVMSG`2 ``.
    #[cfg_attr(feature = "serde", serde(default))]
    pub per_command: HashMap<String, LimiterSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub global_command: Option<LimiterSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub global_bytes: Option<LimiterSpec>,
}

/// Full per-network configuration (spec §6.2).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct NetworkConfig {
    pub servers: Vec<ServerEntry>,
    pub primary_nick: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub secondary_nick: Option<String>,
    #[cfg_attr(feature = "serde", serde(default = "default_ident"))]
    pub ident: String,
    #[cfg_attr(feature = "serde", serde(default = "default_realname"))]
    pub real_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub server_password: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub account_name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub account_password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub account_certificate_file: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub account_certificate_password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub auth_type: AuthType,
    #[cfg_attr(feature = "serde", serde(default))]
    pub disabled_sasl_mechs: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub abort_on_sasl_failure: bool,

    #[cfg_attr(feature = "serde", serde(default = "default_connect_timeout", with = "duration_secs"))]
    pub connect_timeout: Duration,
    #[cfg_attr(feature = "serde", serde(default = "default_connect_retries"))]
    pub connect_retries: u32,
    #[cfg_attr(feature = "serde", serde(default = "default_ping_interval", with = "duration_secs"))]
    pub ping_interval: Duration,
    #[cfg_attr(feature = "serde", serde(default = "default_ping_timeout", with = "duration_secs"))]
    pub ping_timeout: Duration,

    #[cfg_attr(feature = "serde", serde(default))]
    pub accept_all_certificates: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trusted_fingerprints: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub check_online_revocation: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bind_host: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub use_cprivmsg: bool,

    #[cfg_attr(feature = "serde", serde(default))]
    pub channels: Vec<ChannelEntry>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub oper_name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub oper_password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub challenge_key_file: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub challenge_key_password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub service_oper_password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub service_oper_command: Option<String>,

    #[cfg_attr(feature = "serde", serde(default = "default_join_timeout", with = "duration_millis"))]
    pub join_timeout: Duration,
    #[cfg_attr(feature = "serde", serde(default = "default_command_prefix"))]
    pub command_prefix: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub rate_limiter: RateLimiterConfig,

    /// Account name to the permissions it grants.
    #[cfg_attr(feature = "serde", serde(default))]
    pub permissions: HashMap<String, Vec<String>>,
}

fn default_ident() -> String {
    "bot".to_string()
}
fn default_realname() -> String {
    "netwolf-client bot".to_string()
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_connect_retries() -> u32 {
    3
}
fn default_ping_interval() -> Duration {
    Duration::from_secs(90)
}
fn default_ping_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_join_timeout() -> Duration {
    Duration::from_millis(8000)
}
fn default_command_prefix() -> String {
    "!".to_string()
}

#[cfg(feature = "net")]
impl NetworkConfig {
    /// Build the [`crate::engine::HandshakeConfig`] subset this config
    /// implies.
    #[must_use]
    pub fn handshake_config(
        &self,
        have_client_cert: bool,
        have_channel_binding: bool,
    ) -> crate::engine::HandshakeConfig {
        let (sasl_account, sasl_password) = match self.auth_type {
            AuthType::Sasl => (self.account_name.clone(), self.account_password.clone()),
            AuthType::NickServ | AuthType::None => (None, None),
        };
        crate::engine::HandshakeConfig {
            primary_nick: self.primary_nick.clone(),
            secondary_nick: self.secondary_nick.clone(),
            username: self.ident.clone(),
            realname: self.real_name.clone(),
            server_password: self.server_password.clone(),
            sasl_account,
            sasl_password,
            have_client_cert,
            have_channel_binding,
            sasl_required: self.abort_on_sasl_failure,
            disabled_sasl_mechanisms: self.disabled_sasl_mechs.clone(),
            extra_caps: Vec::new(),
        }
    }

    /// Build the [`crate::ratelimit::RateLimitChain`] this config describes.
    #[must_use]
    pub fn rate_limit_chain(&self) -> crate::ratelimit::RateLimitChain {
        let r = &self.rate_limiter;
        let per_target_overrides = r
            .per_target
            .iter()
            .filter_map(|(target, spec)| spec.as_token_bucket().map(|cfg| (target.clone(), cfg)))
            .collect();
        let per_command = r
            .per_command
            .iter()
            .filter_map(|(key, spec)| spec.as_sliding_window().map(|cfg| (key.clone(), cfg)))
            .collect();
        crate::ratelimit::RateLimitChain::new(
            r.default_per_target.as_ref().and_then(LimiterSpec::as_token_bucket),
            per_target_overrides,
            per_command,
            r.global_command.as_ref().and_then(LimiterSpec::as_token_bucket),
            r.global_bytes.as_ref().and_then(LimiterSpec::as_sliding_window),
        )
    }
}

#[cfg(feature = "config-toml")]
impl NetworkConfig {
    /// Load a [`NetworkConfig`] from a TOML file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(feature = "serde")]
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(feature = "serde")]
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(feature = "serde")]
mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_entry_parses_key() {
        let c = ChannelEntry::parse("#foo secretkey");
        assert_eq!(c.name, "#foo");
        assert_eq!(c.key.as_deref(), Some("secretkey"));
    }

    #[test]
    fn channel_entry_without_key() {
        let c = ChannelEntry::parse("#foo");
        assert_eq!(c.name, "#foo");
        assert_eq!(c.key, None);
    }

    #[test]
    fn server_entry_defaults_tls_by_port() {
        let e = ServerEntry { host: "irc.example".into(), port: 6697, tls: None };
        assert!(e.uses_tls());
        let e = ServerEntry { host: "irc.example".into(), port: 6667, tls: None };
        assert!(!e.uses_tls());
    }
}
