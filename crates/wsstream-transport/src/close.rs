//! WebSocket close status codes (RFC 6455 §7.4).

use std::fmt;

/// A close status code carried by a close control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000: the purpose of the connection has been fulfilled.
    Normal,
    /// 1001: endpoint is going away (server shutdown, page navigation).
    Away,
    /// 1002: protocol error.
    Protocol,
    /// 1003: received a data type the endpoint cannot accept.
    Unsupported,
    /// 1005: no status code was present in the close frame.
    NoStatus,
    /// 1006: connection dropped without a close frame. Never sent on the wire.
    Abnormal,
    /// 1007: message data was inconsistent with its type.
    InvalidPayload,
    /// 1008: policy violation.
    Policy,
    /// 1009: message too big to process.
    TooBig,
    /// 1010: client expected an extension the server did not negotiate.
    MandatoryExtension,
    /// 1011: unexpected condition on the server.
    InternalError,
    /// 1012: service restart.
    Restart,
    /// 1013: try again later.
    TryAgain,
    /// 1015: TLS handshake failure. Never sent on the wire.
    Tls,
    /// Any code outside the registry above.
    Other(u16),
}

impl CloseCode {
    /// True for the clean shutdown code.
    pub fn is_normal(self) -> bool {
        self == CloseCode::Normal
    }

    /// True for the code reported when the peer vanished without a close frame.
    pub fn is_abnormal(self) -> bool {
        self == CloseCode::Abnormal
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::Protocol,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::Policy,
            1009 => CloseCode::TooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            1012 => CloseCode::Restart,
            1013 => CloseCode::TryAgain,
            1015 => CloseCode::Tls,
            other => CloseCode::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::Protocol => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::Policy => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Restart => 1012,
            CloseCode::TryAgain => 1013,
            CloseCode::Tls => 1015,
            CloseCode::Other(code) => code,
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u16::from(*self))
    }
}

/// Build the payload of a close control frame: 2-byte big-endian code + UTF-8 reason.
///
/// `NoStatus` produces an empty payload, since 1005 must not appear on the wire.
pub fn format_close_payload(code: CloseCode, reason: &str) -> Vec<u8> {
    if code == CloseCode::NoStatus {
        return Vec::new();
    }
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&u16::from(code).to_be_bytes());
    payload.extend_from_slice(reason.as_bytes());
    payload
}

/// Parse a close control frame payload.
///
/// An empty payload means `NoStatus`. A one-byte payload is malformed.
pub fn parse_close_payload(payload: &[u8]) -> Option<(CloseCode, String)> {
    match payload.len() {
        0 => Some((CloseCode::NoStatus, String::new())),
        1 => None,
        _ => {
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
            Some((CloseCode::from(code), reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_codes_map_both_ways() {
        for raw in [
            1000u16, 1001, 1002, 1003, 1005, 1006, 1007, 1008, 1009, 1010, 1011, 1012, 1013, 1015,
        ] {
            let code = CloseCode::from(raw);
            assert!(!matches!(code, CloseCode::Other(_)), "{raw} should be registered");
            assert_eq!(u16::from(code), raw);
        }
    }

    #[test]
    fn unknown_code_is_preserved() {
        let code = CloseCode::from(4000);
        assert_eq!(code, CloseCode::Other(4000));
        assert_eq!(code.to_string(), "4000");
    }

    #[test]
    fn close_payload_carries_code_and_reason() {
        let payload = format_close_payload(CloseCode::Normal, "bye");
        assert_eq!(&payload[..2], &[0x03, 0xE8]);
        assert_eq!(
            parse_close_payload(&payload),
            Some((CloseCode::Normal, "bye".to_string()))
        );
    }

    #[test]
    fn no_status_has_empty_payload() {
        assert!(format_close_payload(CloseCode::NoStatus, "ignored").is_empty());
        assert_eq!(
            parse_close_payload(&[]),
            Some((CloseCode::NoStatus, String::new()))
        );
    }

    #[test]
    fn single_byte_payload_is_malformed() {
        assert_eq!(parse_close_payload(&[0x03]), None);
    }

    #[test]
    fn normal_and_abnormal_predicates() {
        assert!(CloseCode::Normal.is_normal());
        assert!(!CloseCode::Away.is_normal());
        assert!(CloseCode::Abnormal.is_abnormal());
        assert!(!CloseCode::Normal.is_abnormal());
    }
}
