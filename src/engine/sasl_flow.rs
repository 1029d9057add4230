//! Drives one SASL mechanism's `AUTHENTICATE` exchange (spec §4.6).
//!
//! Wraps the chunking helpers in [`crate::sasl`] and [`crate::sasl::scram`]
//! behind a single `feed` entry point the handshake machine calls for every
//! inbound message while in its `Sasl` state.

use crate::command::Command;
use crate::message::Message;
use crate::sasl::scram::ScramClient;
use crate::sasl::{chunk_response, decode_base64, encode_external, encode_plain, SaslMechanism, SASL_CHUNK_SIZE};

/// 64 KiB, per spec §4.6's SASL buffer abort threshold.
const MAX_BUFFER: usize = 64 * 1024;

enum Driver {
    Plain { account: String, password: String, sent: bool },
    External { account: String, sent: bool },
    Scram { client: ScramClient, step: ScramStep },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScramStep {
    AwaitingPrompt,
    AwaitingServerFirst,
    AwaitingServerFinal,
}

/// What the handshake machine should do after feeding one message to the
/// SASL flow.
pub enum SaslOutcome {
    /// Send these `AUTHENTICATE` lines (already chunked) and keep waiting.
    Pending(Vec<String>),
    /// `903`/`907`: authentication succeeded.
    Success,
    /// This mechanism failed (`904`/`905`). `retry` is true when another
    /// mechanism remains to try.
    Failed {
        retry: bool,
        mechanisms_remaining: Vec<SaslMechanism>,
    },
    /// `902`/`906` or a buffer overrun: fatal for the session.
    Fatal,
    /// Not a message this flow needs to act on (e.g. `900 RPL_LOGGEDIN`,
    /// which only records the account name).
    Ignore,
}

pub struct SaslFlow {
    driver: Driver,
    available: Vec<SaslMechanism>,
    tried: Vec<SaslMechanism>,
    buffer: String,
}

impl SaslFlow {
    #[must_use]
    pub fn new(
        mechanism: SaslMechanism,
        account: String,
        password: String,
        available: Vec<SaslMechanism>,
    ) -> Self {
        let driver = match mechanism.scram_hash() {
            Some(hash) => Driver::Scram {
                client: ScramClient::new(hash, &account, &password),
                step: ScramStep::AwaitingPrompt,
            },
            None if mechanism == SaslMechanism::External => Driver::External {
                account,
                sent: false,
            },
            None => Driver::Plain {
                account,
                password,
                sent: false,
            },
        };
        Self {
            driver,
            available,
            tried: vec![mechanism],
            buffer: String::new(),
        }
    }

    /// Called immediately after `AUTHENTICATE <mech>` is queued. SASL never
    /// sends a response before the server's first prompt, so this always
    /// returns `None` — kept for symmetry with [`Self::feed`]'s call sites.
    pub fn begin(&mut self) -> Option<Vec<String>> {
        None
    }

    pub fn feed(&mut self, msg: &Message) -> SaslOutcome {
        match &msg.command {
            Command::Authenticate(chunk) => self.feed_chunk(chunk),
            Command::Numeric(900, _) => SaslOutcome::Ignore,
            Command::Numeric(903 | 907, _) => SaslOutcome::Success,
            Command::Numeric(904 | 905, _) => self.fail(true),
            Command::Numeric(902 | 906, _) => SaslOutcome::Fatal,
            Command::Numeric(908, args) => {
                if let Some(list) = args.last() {
                    let announced = crate::sasl::parse_mechanisms(list);
                    self.available.retain(|m| announced.contains(m));
                }
                SaslOutcome::Ignore
            }
            _ => SaslOutcome::Ignore,
        }
    }

    fn fail(&mut self, retry: bool) -> SaslOutcome {
        let remaining: Vec<_> = self
            .available
            .iter()
            .filter(|m| !self.tried.contains(m))
            .cloned()
            .collect();
        SaslOutcome::Failed {
            retry: retry && !remaining.is_empty(),
            mechanisms_remaining: remaining,
        }
    }

    fn feed_chunk(&mut self, chunk: &str) -> SaslOutcome {
        if chunk == "+" && self.buffer.is_empty() {
            return self.dispatch("");
        }
        self.buffer.push_str(chunk);
        if self.buffer.len() > MAX_BUFFER {
            return SaslOutcome::Fatal;
        }
        if chunk.len() == SASL_CHUNK_SIZE {
            // More chunks still to come.
            return SaslOutcome::Pending(Vec::new());
        }
        let assembled = std::mem::take(&mut self.buffer);
        self.dispatch(&assembled)
    }

    fn dispatch(&mut self, assembled_b64: &str) -> SaslOutcome {
        let response = match &mut self.driver {
            Driver::Plain {
                account,
                password,
                sent,
            } => {
                if *sent {
                    None
                } else {
                    *sent = true;
                    Some(encode_plain(account, password))
                }
            }
            Driver::External { account, sent } => {
                if *sent {
                    None
                } else {
                    *sent = true;
                    let authzid = if account.is_empty() {
                        None
                    } else {
                        Some(account.as_str())
                    };
                    Some(encode_external(authzid))
                }
            }
            Driver::Scram { client, step } => match step {
                ScramStep::AwaitingPrompt => {
                    *step = ScramStep::AwaitingServerFirst;
                    Some(client.client_first_message())
                }
                ScramStep::AwaitingServerFirst => match client.process_server_first(assembled_b64)
                {
                    Ok(client_final) => {
                        *step = ScramStep::AwaitingServerFinal;
                        Some(client_final)
                    }
                    Err(_) => return SaslOutcome::Fatal,
                },
                ScramStep::AwaitingServerFinal => match client.verify_server_final(assembled_b64) {
                    Ok(()) => None,
                    Err(_) => return SaslOutcome::Fatal,
                },
            },
        };

        match response {
            Some(encoded) => SaslOutcome::Pending(encode_authenticate_lines(&encoded)),
            None => SaslOutcome::Pending(Vec::new()),
        }
    }
}

/// Chunk an encoded response into `AUTHENTICATE` line payloads, appending a
/// trailing `+` if the final chunk is exactly [`SASL_CHUNK_SIZE`] bytes (the
/// receiver otherwise can't tell that chunk was the last one).
fn encode_authenticate_lines(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return vec!["+".to_string()];
    }
    let mut lines: Vec<String> = chunk_response(encoded).map(str::to_string).collect();
    if lines.last().map(String::len) == Some(SASL_CHUNK_SIZE) {
        lines.push("+".to_string());
    }
    lines
}
