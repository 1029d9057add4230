//! Transport error types (spec §4.3).

/// Errors that can occur while reading a line from the transport.
#[derive(Debug)]
#[non_exhaustive]
pub enum TransportReadError {
    /// An I/O error occurred.
    Io(std::io::Error),
    /// The peer sent a line longer than [`super::MAX_IRC_LINE_LEN`].
    LineTooLong { preview: String },
    /// The peer sent a forbidden control character.
    IllegalControlChar { ch: char, preview: String },
}

impl std::fmt::Display for TransportReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "transport I/O error: {e}"),
            Self::LineTooLong { preview } => write!(f, "line too long: {preview:?}..."),
            Self::IllegalControlChar { ch, preview } => {
                write!(f, "illegal control char {ch:?} in line: {preview:?}...")
            }
        }
    }
}

impl std::error::Error for TransportReadError {}

impl From<std::io::Error> for TransportReadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Errors that can occur while dialing or establishing TLS.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConnectError {
    /// The dial deadline elapsed before the TCP handshake completed.
    Timeout,
    /// The underlying I/O operation failed.
    Io(std::io::Error),
    /// TLS handshake or certificate validation failed.
    Tls(String),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "connection deadline elapsed"),
            Self::Io(e) => write!(f, "connect I/O error: {e}"),
            Self::Tls(msg) => write!(f, "TLS error: {msg}"),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<std::io::Error> for ConnectError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
