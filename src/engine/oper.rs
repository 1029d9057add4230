//! `OPER`, `CHALLENGE`, and services-oper (spec §4.6). Used by
//! `bot::runtime`'s startup sequence but part of the engine's public
//! surface since it only needs an [`EngineHandle`].

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha1::{Digest, Sha1};
use tokio::sync::broadcast::error::RecvError;

use crate::command::Command;
use crate::message::Message;

use super::EngineHandle;

/// `OPER`'s fallback wait, and services-oper's fixed wait (spec §4.6/§4.9).
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of an `OPER` or `CHALLENGE` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperOutcome {
    Success,
    Failure { numeric: u16 },
    /// Neither a success nor a recognized failure numeric arrived within
    /// the fallback window.
    TimedOut,
}

/// Send `OPER <name> <password>` and resolve on `381`, `461`/`464`/`491`,
/// or a 5s fallback timeout.
pub async fn oper(handle: &EngineHandle, name: &str, password: &str) -> OperOutcome {
    let mut events = handle.subscribe();
    handle.send(Message::new(Command::Oper {
        name: name.to_string(),
        password: password.to_string(),
    }));
    await_oper_numeric(&mut events).await
}

async fn await_oper_numeric(events: &mut tokio::sync::broadcast::Receiver<Message>) -> OperOutcome {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(msg) => {
                    if let Command::Numeric(code, _) = msg.command {
                        match code {
                            381 => return OperOutcome::Success,
                            461 | 464 | 491 => return OperOutcome::Failure { numeric: code },
                            _ => {}
                        }
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return OperOutcome::TimedOut,
            }
        }
    };
    tokio::time::timeout(FALLBACK_TIMEOUT, wait)
        .await
        .unwrap_or(OperOutcome::TimedOut)
}

/// Errors specific to the `CHALLENGE` exchange's local crypto step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    InvalidKey(String),
    Decrypt(String),
}

/// Send `CHALLENGE <name>`, accumulate `740` parts, RSA-OAEP-SHA1-decrypt
/// the base64 ciphertext with `key_pem` on `741`, SHA-1 the plaintext, and
/// reply `CHALLENGE +<base64 digest>`. Resolves on `381` the same as
/// [`oper`]; a local decrypt failure short-circuits immediately.
pub async fn challenge(
    handle: &EngineHandle,
    name: &str,
    key_pem: &str,
    key_password: Option<&str>,
) -> Result<OperOutcome, ChallengeError> {
    let mut events = handle.subscribe();
    handle.send(Message::new(Command::Challenge(name.to_string())));

    let mut accumulated = String::new();
    let wait = async {
        loop {
            match events.recv().await {
                Ok(msg) => match &msg.command {
                    Command::Numeric(740, args) => {
                        if let Some(part) = args.last() {
                            accumulated.push_str(part);
                        }
                    }
                    Command::Numeric(741, _) => {
                        send_challenge_response(handle, &accumulated, key_pem, key_password)?;
                    }
                    Command::Numeric(code, _)
                        if *code == 381 || matches!(*code, 461 | 464 | 491) =>
                    {
                        return Ok(if *code == 381 {
                            OperOutcome::Success
                        } else {
                            OperOutcome::Failure { numeric: *code }
                        });
                    }
                    _ => {}
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Ok(OperOutcome::TimedOut),
            }
        }
    };

    match tokio::time::timeout(FALLBACK_TIMEOUT, wait).await {
        Ok(result) => result,
        Err(_) => Ok(OperOutcome::TimedOut),
    }
}

fn send_challenge_response(
    handle: &EngineHandle,
    accumulated_b64: &str,
    key_pem: &str,
    key_password: Option<&str>,
) -> Result<(), ChallengeError> {
    let key = load_private_key(key_pem, key_password)?;
    let ciphertext = BASE64
        .decode(accumulated_b64)
        .map_err(|e| ChallengeError::Decrypt(e.to_string()))?;
    let plaintext = key
        .decrypt(Oaep::new::<Sha1>(), &ciphertext)
        .map_err(|e| ChallengeError::Decrypt(e.to_string()))?;
    let digest = Sha1::digest(&plaintext);
    let response = BASE64.encode(digest);
    handle.send(Message::new(Command::Challenge(format!("+{response}"))));
    Ok(())
}

fn load_private_key(pem: &str, password: Option<&str>) -> Result<RsaPrivateKey, ChallengeError> {
    if let Some(password) = password {
        return RsaPrivateKey::from_pkcs8_encrypted_pem(pem, password)
            .map_err(|e| ChallengeError::InvalidKey(e.to_string()));
    }
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| ChallengeError::InvalidKey(e.to_string()))
}

/// Send a configured services-oper raw command with `{password}`
/// interpolated, then wait a fixed 5s (the server gives no correlated
/// reply to watch for).
pub async fn services_oper(handle: &EngineHandle, raw_template: &str, password: &str) {
    let line = raw_template.replace("{password}", password);
    if let Ok(msg) = line.parse::<Message>() {
        handle.send(msg);
    } else {
        // Not a well-formed verb+args line; send as a raw passthrough.
        handle.send(Message::new(Command::Raw(
            line.split_whitespace().next().unwrap_or_default().to_string(),
            line.split_whitespace().skip(1).map(str::to_string).collect(),
        )));
    }
    tokio::time::sleep(FALLBACK_TIMEOUT).await;
}
