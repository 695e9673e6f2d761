use std::fmt;
use std::io;

use wsstream_client::ClientError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected => TRANSPORT_ERROR,
        io::ErrorKind::InvalidInput => USAGE,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Dial { .. } | ClientError::DialFailed { .. } => {
            io_error(context, io::Error::from(err))
        }
        ClientError::InvalidHeaderName(_)
        | ClientError::InvalidHeaderValue(_)
        | ClientError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_exit_codes() {
        let code = |kind| io_error("x", io::Error::from(kind)).code;
        assert_eq!(code(io::ErrorKind::TimedOut), TIMEOUT);
        assert_eq!(code(io::ErrorKind::ConnectionRefused), FAILURE);
        assert_eq!(code(io::ErrorKind::ConnectionAborted), TRANSPORT_ERROR);
        assert_eq!(code(io::ErrorKind::Other), INTERNAL);
    }

    #[test]
    fn client_errors_map_to_exit_codes() {
        let err = client_error("load", ClientError::InvalidConfig("no uri".into()));
        assert_eq!(err.code, USAGE);
        assert_eq!(err.to_string(), "load: invalid client config: no uri");

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(client_error("load", json.into()).code, DATA_INVALID);
    }
}
