//! Sans-IO registration handshake state machine (spec §4.6).
//!
//! Adapted from the teacher's `HandshakeMachine`: `feed` never touches the
//! network, it only consumes parsed messages and returns actions for the
//! caller (`engine::mod`'s message loop) to perform. The state set is
//! broader than the teacher's to match the full
//! `Connecting → CapLs → CapReq → [Sasl] → NickUser → Welcomed →
//! Operational → Disconnected` flow.

use crate::caps::{batch_cap_req, select_request_caps};
use crate::error::HandshakeError;
use crate::message::Message;
use crate::sasl::SaslMechanism;

use super::sasl_flow::{SaslFlow, SaslOutcome};

/// Registration handshake state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    Connecting,
    CapLs,
    CapReq,
    Sasl,
    NickUser,
    Welcomed,
    Operational,
    Disconnected,
}

/// Static configuration the handshake needs for the lifetime of one
/// connection attempt.
#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    pub primary_nick: String,
    pub secondary_nick: Option<String>,
    pub username: String,
    pub realname: String,
    pub server_password: Option<String>,
    pub sasl_account: Option<String>,
    pub sasl_password: Option<String>,
    pub have_client_cert: bool,
    pub have_channel_binding: bool,
    pub sasl_required: bool,
    pub disabled_sasl_mechanisms: Vec<String>,
    /// Additional CAPs to request beyond [`crate::caps::DEFAULT_REQUEST_CAPS`],
    /// e.g. from a registered `CapFilter`.
    pub extra_caps: Vec<String>,
}

impl HandshakeConfig {
    fn secondary(&self) -> String {
        self.secondary_nick
            .clone()
            .unwrap_or_else(|| format!("{}_", self.primary_nick))
    }
}

/// One thing the caller must do in response to a `feed`/`start` call.
pub enum HandshakeAction {
    /// Send this message to the server.
    Send(Message),
    /// Handshake finished successfully; the connection is now operational
    /// under `nick`.
    Complete { nick: String },
    /// Handshake failed; the caller should disconnect.
    Failed(HandshakeError),
}

/// Drives one connection's registration handshake.
pub struct HandshakeMachine {
    config: HandshakeConfig,
    state: HandshakeState,
    available_caps: Vec<String>,
    pending_caps: Vec<String>,
    enabled_caps: Vec<String>,
    attempted_nick: String,
    tried_secondary: bool,
    sasl: Option<SaslFlow>,
    sasl_mechs_hint: Option<Vec<SaslMechanism>>,
}

impl HandshakeMachine {
    #[must_use]
    pub fn new(config: HandshakeConfig) -> Self {
        let attempted_nick = config.primary_nick.clone();
        Self {
            config,
            state: HandshakeState::Connecting,
            available_caps: Vec::new(),
            pending_caps: Vec::new(),
            enabled_caps: Vec::new(),
            attempted_nick,
            tried_secondary: false,
            sasl: None,
            sasl_mechs_hint: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Produce the initial outgoing messages: `PASS` (if configured),
    /// `CAP LS 302`, `NICK`, `USER`. The server holds `001` until `CAP END`
    /// regardless of when `NICK`/`USER` arrive, so these are sent together.
    #[must_use]
    pub fn start(&mut self) -> Vec<HandshakeAction> {
        let mut actions = Vec::new();
        if let Some(pass) = &self.config.server_password {
            actions.push(HandshakeAction::Send(Message::new(
                crate::command::Command::Pass(pass.clone()),
            )));
        }
        actions.push(HandshakeAction::Send(Message::cap(
            "LS",
            vec!["302".to_string()],
        )));
        actions.push(HandshakeAction::Send(Message::nick(&self.attempted_nick)));
        actions.push(HandshakeAction::Send(Message::new(
            crate::command::Command::User {
                user: self.config.username.clone(),
                mode: "0".to_string(),
                realname: self.config.realname.clone(),
            },
        )));
        self.state = HandshakeState::CapLs;
        actions
    }

    /// Feed one parsed inbound message to the machine.
    #[must_use]
    pub fn feed(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        match self.state {
            HandshakeState::Connecting => Vec::new(),
            HandshakeState::CapLs => self.feed_cap_ls(msg),
            HandshakeState::CapReq => self.feed_cap_req(msg),
            HandshakeState::Sasl => self.feed_sasl(msg),
            HandshakeState::NickUser => self.feed_nick_user(msg),
            HandshakeState::Welcomed
            | HandshakeState::Operational
            | HandshakeState::Disconnected => Vec::new(),
        }
    }

    fn feed_cap_ls(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        let crate::command::Command::Cap { sub, args, .. } = &msg.command else {
            return Vec::new();
        };
        if !sub.eq_ignore_ascii_case("LS") {
            return Vec::new();
        }

        let (is_multiline, caps_str) = match args.first().map(String::as_str) {
            Some("*") => (true, args.get(1).map(String::as_str).unwrap_or("")),
            _ => (false, args.first().map(String::as_str).unwrap_or("")),
        };
        for cap in caps_str.split_whitespace() {
            self.available_caps.push(cap.to_string());
        }
        if is_multiline {
            return Vec::new();
        }

        let requested = select_request_caps(&self.available_caps, |name| {
            self.config.extra_caps.iter().any(|c| c == name)
        });
        if requested.is_empty() {
            return self.finish_cap_negotiation();
        }

        self.pending_caps = requested.clone();
        self.state = HandshakeState::CapReq;
        batch_cap_req(&requested, &self.attempted_nick, 0)
            .into_iter()
            .map(|batch| {
                HandshakeAction::Send(Message::cap("REQ", vec![batch]))
            })
            .collect()
    }

    fn feed_cap_req(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        let crate::command::Command::Cap { sub, args, .. } = &msg.command else {
            return Vec::new();
        };
        let caps_str = args.last().map(String::as_str).unwrap_or("");
        match sub.to_ascii_uppercase().as_str() {
            "ACK" => {
                for cap in caps_str.split_whitespace() {
                    let name = cap.trim_start_matches(['-', '~', '=']);
                    self.pending_caps.retain(|c| c != name);
                    if !cap.starts_with('-') {
                        self.enabled_caps.push(name.to_string());
                    }
                }
            }
            "NAK" => {
                for cap in caps_str.split_whitespace() {
                    self.pending_caps.retain(|c| c != cap);
                }
            }
            _ => return Vec::new(),
        }

        if !self.pending_caps.is_empty() {
            return Vec::new();
        }

        if self.enabled_caps.iter().any(|c| c == "sasl") && self.config.sasl_account.is_some() {
            self.begin_sasl()
        } else {
            self.finish_cap_negotiation()
        }
    }

    fn begin_sasl(&mut self) -> Vec<HandshakeAction> {
        let account = self.config.sasl_account.clone().unwrap_or_default();
        let password = self.config.sasl_password.clone().unwrap_or_default();
        let available = self
            .sasl_mechs_hint
            .clone()
            .unwrap_or_else(default_mechanism_preference);
        let available: Vec<_> = available
            .into_iter()
            .filter(|m| {
                !self
                    .config
                    .disabled_sasl_mechanisms
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(m.as_str()))
            })
            .collect();

        let Some(mechanism) = crate::sasl::choose_mechanism(
            &available,
            self.config.have_client_cert,
            self.config.have_channel_binding,
        ) else {
            return if self.config.sasl_required {
                self.state = HandshakeState::Disconnected;
                vec![HandshakeAction::Failed(HandshakeError::SaslRequired)]
            } else {
                self.finish_cap_negotiation()
            };
        };

        let mut flow = SaslFlow::new(mechanism.clone(), account, password, available);
        let first = flow.begin();
        self.sasl = Some(flow);
        self.state = HandshakeState::Sasl;
        let mut actions = vec![HandshakeAction::Send(Message::new(
            crate::command::Command::Authenticate(mechanism.as_str().to_string()),
        ))];
        if let Some(response) = first {
            actions.extend(
                response
                    .into_iter()
                    .map(|line| {
                        HandshakeAction::Send(Message::new(crate::command::Command::Authenticate(
                            line,
                        )))
                    }),
            );
        }
        actions
    }

    fn feed_sasl(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        let Some(flow) = self.sasl.as_mut() else {
            return Vec::new();
        };
        match flow.feed(msg) {
            SaslOutcome::Pending(lines) => lines
                .into_iter()
                .map(|line| {
                    HandshakeAction::Send(Message::new(crate::command::Command::Authenticate(
                        line,
                    )))
                })
                .collect(),
            SaslOutcome::Success => self.finish_cap_negotiation(),
            SaslOutcome::Failed { retry, mechanisms_remaining } => {
                self.sasl_mechs_hint = Some(mechanisms_remaining);
                if retry {
                    self.begin_sasl()
                } else if self.config.sasl_required {
                    self.state = HandshakeState::Disconnected;
                    vec![HandshakeAction::Failed(HandshakeError::SaslRequired)]
                } else {
                    self.finish_cap_negotiation()
                }
            }
            SaslOutcome::Fatal => {
                if self.config.sasl_required {
                    self.state = HandshakeState::Disconnected;
                    vec![HandshakeAction::Failed(HandshakeError::SaslRequired)]
                } else {
                    self.finish_cap_negotiation()
                }
            }
            SaslOutcome::Ignore => Vec::new(),
        }
    }

    fn feed_nick_user(&mut self, msg: &Message) -> Vec<HandshakeAction> {
        match &msg.command {
            crate::command::Command::Numeric(1, args) => {
                let nick = args.first().cloned().unwrap_or_else(|| self.attempted_nick.clone());
                self.state = HandshakeState::Operational;
                vec![HandshakeAction::Complete { nick }]
            }
            crate::command::Command::Numeric(432 | 433, _) => {
                if !self.tried_secondary && self.attempted_nick == self.config.primary_nick {
                    self.tried_secondary = true;
                    self.attempted_nick = self.config.secondary();
                    vec![HandshakeAction::Send(Message::nick(&self.attempted_nick))]
                } else {
                    self.state = HandshakeState::Disconnected;
                    vec![HandshakeAction::Failed(HandshakeError::NicksExhausted)]
                }
            }
            _ => Vec::new(),
        }
    }

    fn finish_cap_negotiation(&mut self) -> Vec<HandshakeAction> {
        self.state = HandshakeState::NickUser;
        vec![HandshakeAction::Send(Message::cap("END", Vec::new()))]
    }
}

fn default_mechanism_preference() -> Vec<SaslMechanism> {
    vec![
        SaslMechanism::External,
        SaslMechanism::ScramSha512Plus,
        SaslMechanism::ScramSha512,
        SaslMechanism::ScramSha256Plus,
        SaslMechanism::ScramSha256,
        SaslMechanism::ScramSha1Plus,
        SaslMechanism::ScramSha1,
        SaslMechanism::Plain,
    ]
}
