//! Mapping of transport closure signals onto stream semantics.
//!
//! | transport signal           | stream result                          |
//! |----------------------------|----------------------------------------|
//! | close code 1000 (normal)   | end of stream (`Ok(0)` from `read`)    |
//! | close code 1006 (abnormal) | [`StreamError::ConnectionClosed`]      |
//! | anything else              | unchanged                              |

use std::io;

use wsstream_transport::{close_error, CloseCode};

use crate::error::StreamError;

/// Stream-level meaning of a transport error.
#[derive(Debug)]
pub enum Translated {
    /// The peer completed a normal close handshake.
    Eof,
    /// The peer vanished without a close handshake.
    Closed(io::Error),
    /// Any other error, unchanged.
    Other(io::Error),
}

impl Translated {
    /// Result a `read` call reports for this error.
    pub fn into_read_result(self) -> io::Result<usize> {
        match self {
            Translated::Eof => Ok(0),
            Translated::Closed(err) | Translated::Other(err) => Err(err),
        }
    }
}

/// Classify a transport error.
pub fn translate(err: io::Error) -> Translated {
    match close_error(&err).map(|close| close.code) {
        Some(CloseCode::Normal) => Translated::Eof,
        Some(CloseCode::Abnormal) => Translated::Closed(StreamError::ConnectionClosed.into()),
        _ => Translated::Other(err),
    }
}

#[cfg(test)]
mod tests {
    use wsstream_transport::CloseError;

    use super::*;
    use crate::error::is_connection_closed;

    #[test]
    fn normal_closure_is_eof() {
        let err = CloseError::new(CloseCode::Normal, "bye").into_io();
        assert!(matches!(translate(err), Translated::Eof));
    }

    #[test]
    fn normal_closure_reads_as_zero_bytes() {
        let err = CloseError::new(CloseCode::Normal, "").into_io();
        assert_eq!(translate(err).into_read_result().unwrap(), 0);
    }

    #[test]
    fn abnormal_closure_is_connection_closed() {
        let err = CloseError::new(CloseCode::Abnormal, "").into_io();
        let translated = translate(err).into_read_result().unwrap_err();
        assert_eq!(translated.kind(), io::ErrorKind::ConnectionAborted);
        assert!(is_connection_closed(&translated));
    }

    #[test]
    fn other_close_codes_pass_through() {
        let err = CloseError::new(CloseCode::Away, "shutdown").into_io();
        let Translated::Other(err) = translate(err) else {
            panic!("going-away should pass through");
        };
        assert_eq!(close_error(&err).unwrap().code, CloseCode::Away);
    }

    #[test]
    fn plain_io_errors_pass_through() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "deadline");
        let err = translate(err).into_read_result().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(err.to_string(), "deadline");
    }
}
