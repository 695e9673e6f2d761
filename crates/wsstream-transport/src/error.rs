use std::io;

use crate::close::CloseCode;
use crate::traits::HandshakeResponse;

/// The transport observed a close frame, or lost the connection without one.
///
/// Transports report this wrapped in an [`io::Error`] so it can travel through
/// `Read` implementations; use [`close_error`] to recover it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("websocket closed with code {code}{}", fmt_reason(.reason))]
pub struct CloseError {
    /// Close status code.
    pub code: CloseCode,
    /// Optional human-readable reason.
    pub reason: String,
}

impl CloseError {
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Wrap into an `io::Error` whose kind reflects the closure class.
    pub fn into_io(self) -> io::Error {
        let kind = match self.code {
            CloseCode::Normal => io::ErrorKind::UnexpectedEof,
            CloseCode::Abnormal => io::ErrorKind::ConnectionReset,
            _ => io::ErrorKind::ConnectionAborted,
        };
        io::Error::new(kind, self)
    }
}

impl From<CloseError> for io::Error {
    fn from(err: CloseError) -> Self {
        err.into_io()
    }
}

fn fmt_reason(reason: &str) -> String {
    if reason.is_empty() {
        String::new()
    } else {
        format!(": {reason}")
    }
}

/// Recover the [`CloseError`] carried by a transport `io::Error`, if any.
pub fn close_error(err: &io::Error) -> Option<&CloseError> {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<CloseError>())
}

/// A failed outbound handshake.
///
/// `response` holds whatever the server answered before the upgrade was
/// refused, so callers can report the HTTP status and body.
#[derive(Debug, thiserror::Error)]
#[error("websocket handshake failed: {source}")]
pub struct DialError {
    /// Handshake response, when the server answered at all.
    pub response: Option<HandshakeResponse>,
    /// Underlying failure.
    #[source]
    pub source: io::Error,
}

impl DialError {
    /// A failure that happened before any response arrived.
    pub fn new(source: io::Error) -> Self {
        Self {
            response: None,
            source,
        }
    }

    /// A failure with the server's handshake response attached.
    pub fn with_response(source: io::Error, response: HandshakeResponse) -> Self {
        Self {
            response: Some(response),
            source,
        }
    }
}
