use std::io;

/// Stream-level errors raised by the adapter itself.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The peer vanished without completing a close handshake.
    #[error("connection closed")]
    ConnectionClosed,

    /// A single deadline for both directions was requested.
    #[error("combined deadline is not supported, set read and write deadlines separately")]
    DeadlineUnsupported,
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match err {
            StreamError::ConnectionClosed => io::ErrorKind::ConnectionAborted,
            StreamError::DeadlineUnsupported => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}

/// True if `err` reports an abrupt connection loss from this crate.
pub fn is_connection_closed(err: &io::Error) -> bool {
    matches!(
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<StreamError>()),
        Some(StreamError::ConnectionClosed)
    )
}

/// Errors from validating an incoming upgrade request.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The request path does not match the configured path.
    #[error("unexpected path {actual} (expected {expected})")]
    PathMismatch { expected: String, actual: String },

    /// The early-data payload is not valid unpadded base64url.
    #[error("invalid early data: {0}")]
    InvalidEarlyData(#[from] base64::DecodeError),

    /// The early-data header holds non-visible-ASCII bytes.
    #[error("early data header {0} is not valid ASCII")]
    InvalidEarlyDataHeader(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
