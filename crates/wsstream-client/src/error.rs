use std::io;

use http::StatusCode;
use wsstream_transport::DialError;

/// Longest handshake response body kept in a dial error.
const MAX_BODY_EXCERPT: usize = 256;

/// Errors that can occur while configuring or dialing a client stream.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The upgrade handshake failed.
    #[error("websocket dial failed{}: {source}", fmt_response(.status, .body))]
    Dial {
        /// Status of the handshake response, if the server answered.
        status: Option<StatusCode>,
        /// Start of the response body, if any.
        body: Option<String>,
        #[source]
        source: io::Error,
    },

    /// An earlier dial on the same stream failed; the stream is unusable.
    #[error("stream unusable after failed dial: {message}")]
    DialFailed { kind: io::ErrorKind, message: String },

    /// A configured header name is not a valid HTTP header name.
    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    /// A configured header value is not a valid HTTP header value.
    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),

    /// The configuration is incomplete or inconsistent.
    #[error("invalid client config: {0}")]
    InvalidConfig(String),

    /// The configuration file is not valid JSON for [`ClientConfig`](crate::ClientConfig).
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

fn fmt_response(status: &Option<StatusCode>, body: &Option<String>) -> String {
    match (status, body) {
        (Some(status), Some(body)) => format!(" (HTTP {status}: {body})"),
        (Some(status), None) => format!(" (HTTP {status})"),
        _ => String::new(),
    }
}

impl From<ClientError> for io::Error {
    fn from(err: ClientError) -> Self {
        let kind = match &err {
            ClientError::Dial { source, .. } => source.kind(),
            ClientError::DialFailed { kind, .. } => *kind,
            ClientError::InvalidHeaderName(_)
            | ClientError::InvalidHeaderValue(_)
            | ClientError::InvalidConfig(_) => io::ErrorKind::InvalidInput,
            ClientError::Json(_) => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}

/// Fold the handshake response of a failed dial into a [`ClientError`].
pub fn wrap_dial_error(err: DialError) -> ClientError {
    let DialError { response, source } = err;
    let status = response.as_ref().map(|response| response.status());
    let body = response.as_ref().and_then(|response| {
        let text = String::from_utf8_lossy(response.body());
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(text.chars().take(MAX_BODY_EXCERPT).collect())
    });
    ClientError::Dial {
        status,
        body,
        source,
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
