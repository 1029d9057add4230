//! SCRAM-SHA-{1,256,512}(-PLUS) SASL mechanisms (RFC 5802/7677).
//!
//! # SCRAM Protocol Flow
//!
//! 1. Client sends `client-first-message`: `n,,n=user,r=nonce` (or
//!    `p=<cb-name>,,n=user,r=nonce` for a `-PLUS` variant).
//! 2. Server sends `server-first-message`: `r=nonce+server,s=salt,i=iterations`
//! 3. Client sends `client-final-message`: `c=<gs2-header-b64>,r=nonce+server,p=proof`
//! 4. Server sends `server-final-message`: `v=verifier`
//!
//! # Reference
//! - RFC 5802: <https://tools.ietf.org/html/rfc5802>
//! - RFC 7677: <https://tools.ietf.org/html/rfc7677>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Sha256, Sha512, Digest};

use super::decode_base64;

/// Which hash function backs a SCRAM mechanism.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScramHash {
    Sha1,
    Sha256,
    Sha512,
}

impl ScramHash {
    fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    fn hmac(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha256 => {
                let mut mac =
                    Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha512 => {
                let mut mac =
                    Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }

    fn pbkdf2(self, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        match self {
            Self::Sha1 => {
                let mut out = vec![0u8; 20];
                pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out);
                out
            }
            Self::Sha256 => {
                let mut out = vec![0u8; 32];
                pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
                out
            }
            Self::Sha512 => {
                let mut out = vec![0u8; 64];
                pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut out);
                out
            }
        }
    }

    /// The IRCv3 mechanism name, e.g. `SCRAM-SHA-256` or, with channel
    /// binding, `SCRAM-SHA-256-PLUS`.
    #[must_use]
    pub fn mechanism_name(self, channel_binding: bool) -> &'static str {
        match (self, channel_binding) {
            (Self::Sha1, false) => "SCRAM-SHA-1",
            (Self::Sha1, true) => "SCRAM-SHA-1-PLUS",
            (Self::Sha256, false) => "SCRAM-SHA-256",
            (Self::Sha256, true) => "SCRAM-SHA-256-PLUS",
            (Self::Sha512, false) => "SCRAM-SHA-512",
            (Self::Sha512, true) => "SCRAM-SHA-512-PLUS",
        }
    }
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

/// Channel binding data offered to a `-PLUS` variant: the binding type name
/// (`tls-server-end-point` or `tls-exporter`) and the raw key material.
#[derive(Clone, Debug)]
pub struct ChannelBinding {
    pub name: &'static str,
    pub data: Vec<u8>,
}

/// SCRAM client state machine, generic over the negotiated hash function.
#[derive(Clone, Debug)]
pub struct ScramClient {
    hash: ScramHash,
    username: String,
    password: String,
    client_nonce: String,
    channel_binding: Option<ChannelBinding>,
    state: ScramState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScramState {
    Initial,
    ClientFirstSent { gs2_header: Vec<u8>, client_first_bare: String },
    ServerFirstReceived,
    ClientFinalSent { server_signature: Vec<u8> },
    Complete,
    Failed(String),
}

impl ScramClient {
    #[must_use]
    pub fn new(hash: ScramHash, username: &str, password: &str) -> Self {
        Self::with_channel_binding(hash, username, password, None)
    }

    #[must_use]
    pub fn with_channel_binding(
        hash: ScramHash,
        username: &str,
        password: &str,
        channel_binding: Option<ChannelBinding>,
    ) -> Self {
        Self {
            hash,
            username: username.to_string(),
            password: password.to_string(),
            client_nonce: generate_nonce(),
            channel_binding,
            state: ScramState::Initial,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ScramState {
        &self.state
    }

    fn gs2_header(&self) -> Vec<u8> {
        match &self.channel_binding {
            Some(cb) => format!("p={},,", cb.name).into_bytes(),
            None => b"n,,".to_vec(),
        }
    }

    /// Generate the base64-encoded client-first-message.
    #[must_use]
    pub fn client_first_message(&mut self) -> String {
        let gs2_header = self.gs2_header();
        let client_first_bare = format!("n={},r={}", saslprep(&self.username), self.client_nonce);

        let mut full = gs2_header.clone();
        full.extend_from_slice(client_first_bare.as_bytes());

        self.state = ScramState::ClientFirstSent {
            gs2_header,
            client_first_bare,
        };

        BASE64.encode(&full)
    }

    /// Process the server-first-message and produce the base64-encoded
    /// client-final-message.
    pub fn process_server_first(&mut self, server_first: &str) -> Result<String, ScramError> {
        let (gs2_header, client_first_bare) = match &self.state {
            ScramState::ClientFirstSent {
                gs2_header,
                client_first_bare,
            } => (gs2_header.clone(), client_first_bare.clone()),
            _ => return Err(ScramError::UnexpectedState),
        };

        let decoded = decode_base64(server_first).map_err(|_| ScramError::InvalidEncoding)?;
        let message = String::from_utf8(decoded).map_err(|_| ScramError::InvalidEncoding)?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for part in message.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                nonce = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = Some(decode_base64(value).map_err(|_| ScramError::InvalidEncoding)?);
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = Some(value.parse().map_err(|_| ScramError::InvalidIterations)?);
            }
        }

        let nonce = nonce.ok_or(ScramError::MissingNonce)?;
        let salt = salt.ok_or(ScramError::MissingSalt)?;
        let iterations: u32 = iterations.ok_or(ScramError::MissingIterations)?;

        if !nonce.starts_with(&self.client_nonce) {
            return Err(ScramError::NonceMismatch);
        }

        let salted_password = self.hash.pbkdf2(self.password.as_bytes(), &salt, iterations);
        let client_key = self.hash.hmac(&salted_password, b"Client Key");
        let stored_key = self.hash.hash(&client_key);
        let server_key = self.hash.hmac(&salted_password, b"Server Key");

        let cbind_input = match &self.channel_binding {
            Some(cb) => {
                let mut header = gs2_header.clone();
                header.extend_from_slice(&cb.data);
                header
            }
            None => gs2_header,
        };
        let channel_binding_b64 = BASE64.encode(&cbind_input);

        let client_final_without_proof = format!("c={},r={}", channel_binding_b64, nonce);
        let auth_message = format!(
            "{},{},{}",
            client_first_bare, message, client_final_without_proof
        );

        let client_signature = self.hash.hmac(&stored_key, auth_message.as_bytes());
        let client_proof = xor(&client_key, &client_signature);
        let server_signature = self.hash.hmac(&server_key, auth_message.as_bytes());

        let client_final = format!(
            "{},p={}",
            client_final_without_proof,
            BASE64.encode(&client_proof)
        );

        self.state = ScramState::ClientFinalSent { server_signature };

        Ok(BASE64.encode(client_final.as_bytes()))
    }

    /// Verify the server-final-message against the expected server signature.
    pub fn verify_server_final(&mut self, server_final: &str) -> Result<(), ScramError> {
        let expected = match &self.state {
            ScramState::ClientFinalSent { server_signature } => server_signature.clone(),
            _ => return Err(ScramError::UnexpectedState),
        };

        let decoded = decode_base64(server_final).map_err(|_| ScramError::InvalidEncoding)?;
        let message = String::from_utf8(decoded).map_err(|_| ScramError::InvalidEncoding)?;

        let verifier = message
            .strip_prefix("v=")
            .ok_or(ScramError::ServerVerificationFailed)?;
        let verifier = decode_base64(verifier).map_err(|_| ScramError::InvalidEncoding)?;

        if verifier == expected {
            self.state = ScramState::Complete;
            Ok(())
        } else {
            self.state = ScramState::Failed("server signature mismatch".into());
            Err(ScramError::ServerVerificationFailed)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScramError {
    InvalidEncoding,
    NonceMismatch,
    MissingNonce,
    MissingSalt,
    MissingIterations,
    InvalidIterations,
    ServerVerificationFailed,
    UnexpectedState,
}

impl std::fmt::Display for ScramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "invalid base64 encoding"),
            Self::NonceMismatch => write!(f, "server nonce doesn't match client nonce"),
            Self::MissingNonce => write!(f, "missing nonce in server message"),
            Self::MissingSalt => write!(f, "missing salt in server message"),
            Self::MissingIterations => write!(f, "missing iteration count"),
            Self::InvalidIterations => write!(f, "invalid iteration count"),
            Self::ServerVerificationFailed => write!(f, "server verification failed"),
            Self::UnexpectedState => write!(f, "SCRAM message received out of order"),
        }
    }
}

impl std::error::Error for ScramError {}

fn generate_nonce() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Minimal SASLprep (RFC 4013): escape `=` and `,` per RFC 5802 §5.1, since
/// full Unicode normalization is out of scope for the nicks/passwords this
/// client authenticates with.
fn saslprep(s: &str) -> String {
    s.replace('=', "=3D").replace(',', "=2C")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_first_message_has_gs2_header_and_nonce() {
        let mut client = ScramClient::new(ScramHash::Sha256, "user", "pencil");
        let msg = client.client_first_message();
        let decoded = decode_base64(&msg).unwrap();
        let decoded = String::from_utf8(decoded).unwrap();
        assert!(decoded.starts_with("n,,n=user,r="));
    }

    #[test]
    fn saslprep_escapes_reserved_chars() {
        assert_eq!(saslprep("a=b,c"), "a=3Db=2Cc");
    }

    #[test]
    fn full_exchange_round_trip_against_known_vectors() {
        // RFC 5802 SCRAM-SHA-1 worked example.
        let mut client = ScramClient {
            hash: ScramHash::Sha1,
            username: "user".into(),
            password: "pencil".into(),
            client_nonce: "fyko+d2lbbFgONRv9qkxdawL".into(),
            channel_binding: None,
            state: ScramState::Initial,
        };
        let first = client.client_first_message();
        assert_eq!(
            String::from_utf8(decode_base64(&first).unwrap()).unwrap(),
            "n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL"
        );

        let server_first = BASE64.encode(
            "r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096",
        );
        let client_final = client.process_server_first(&server_first).unwrap();
        let decoded_final = String::from_utf8(decode_base64(&client_final).unwrap()).unwrap();
        assert!(decoded_final.starts_with("c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j"));
        assert!(decoded_final.contains(",p="));
    }

    #[test]
    fn mechanism_names_match_ircv3_conventions() {
        assert_eq!(ScramHash::Sha256.mechanism_name(false), "SCRAM-SHA-256");
        assert_eq!(ScramHash::Sha256.mechanism_name(true), "SCRAM-SHA-256-PLUS");
        assert_eq!(ScramHash::Sha1.mechanism_name(false), "SCRAM-SHA-1");
        assert_eq!(ScramHash::Sha512.mechanism_name(false), "SCRAM-SHA-512");
    }
}
