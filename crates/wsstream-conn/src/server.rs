//! Upgrade-request helpers for the accepting side.
//!
//! A client that piggybacks early data on its handshake puts it either at the
//! end of the request URI or in a dedicated header. [`ServerConfig`] recovers
//! it so the server can hand it to [`WsStream::server_with_early_data`].
//!
//! [`WsStream::server_with_early_data`]: crate::WsStream::server_with_early_data

use std::net::{IpAddr, SocketAddr};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use http::HeaderMap;

use crate::error::{Result, ServerError};

/// Header consulted by [`source_address`].
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Where the accepting side expects requests and early data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    /// Request path, e.g. `/ws`.
    pub path: String,
    /// Zero disables early data.
    pub max_early_data: usize,
    /// Header carrying early data. `None` (or empty) means the URI carries it.
    pub early_data_header_name: Option<String>,
}

impl ServerConfig {
    fn header_name(&self) -> Option<&str> {
        self.early_data_header_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    /// Validate the request target and decode any early data.
    ///
    /// `request_uri` is the origin-form target (path plus query). In URI
    /// carriage mode the target must start with the configured path and the
    /// remainder is the encoded early data. Otherwise the path must match
    /// exactly and early data comes from the configured header.
    pub fn extract_early_data(
        &self,
        request_uri: &str,
        headers: &HeaderMap,
    ) -> Result<Option<Bytes>> {
        let path = request_uri.split('?').next().unwrap_or_default();
        let header_name = self.header_name();

        if (self.max_early_data == 0 || header_name.is_some()) && path != self.path {
            return Err(self.mismatch(path));
        }

        let encoded = match header_name {
            None => request_uri
                .strip_prefix(self.path.as_str())
                .ok_or_else(|| self.mismatch(path))?,
            Some(name) => match headers.get(name) {
                None => "",
                Some(value) => value
                    .to_str()
                    .map_err(|_| ServerError::InvalidEarlyDataHeader(name.to_string()))?,
            },
        };

        if encoded.is_empty() {
            return Ok(None);
        }
        let decoded = URL_SAFE_NO_PAD.decode(encoded)?;
        Ok(Some(Bytes::from(decoded)))
    }

    fn mismatch(&self, actual: &str) -> ServerError {
        ServerError::PathMismatch {
            expected: self.path.clone(),
            actual: actual.to_string(),
        }
    }
}

/// Client address as seen through a reverse proxy.
///
/// The first valid IP in `X-Forwarded-For` replaces the IP of `peer`; the
/// port of `peer` is kept. Without a usable header, `peer` is returned.
pub fn source_address(headers: &HeaderMap, peer: SocketAddr) -> SocketAddr {
    let forwarded = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|entry| entry.trim().parse::<IpAddr>().ok());

    match forwarded {
        Some(ip) => SocketAddr::new(ip, peer.port()),
        None => peer,
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn uri_config() -> ServerConfig {
        ServerConfig {
            path: "/ws".to_string(),
            max_early_data: 2048,
            early_data_header_name: None,
        }
    }

    fn header_config() -> ServerConfig {
        ServerConfig {
            path: "/ws".to_string(),
            max_early_data: 2048,
            early_data_header_name: Some("Sec-WebSocket-Protocol".to_string()),
        }
    }

    #[test]
    fn uri_suffix_is_decoded() {
        let encoded = URL_SAFE_NO_PAD.encode(b"hello");
        let early = uri_config()
            .extract_early_data(&format!("/ws{encoded}"), &HeaderMap::new())
            .unwrap();
        assert_eq!(early.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn bare_path_has_no_early_data() {
        let early = uri_config()
            .extract_early_data("/ws", &HeaderMap::new())
            .unwrap();
        assert!(early.is_none());
    }

    #[test]
    fn uri_mode_rejects_foreign_prefix() {
        let err = uri_config()
            .extract_early_data("/other", &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, ServerError::PathMismatch { .. }));
    }

    #[test]
    fn invalid_encoding_is_rejected() {
        let err = uri_config()
            .extract_early_data("/ws!!!", &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidEarlyData(_)));
    }

    #[test]
    fn header_mode_decodes_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "sec-websocket-protocol",
            HeaderValue::from_str(&URL_SAFE_NO_PAD.encode(b"\x00\x01binary")).unwrap(),
        );
        let early = header_config()
            .extract_early_data("/ws", &headers)
            .unwrap();
        assert_eq!(early.as_deref(), Some(&b"\x00\x01binary"[..]));
    }

    #[test]
    fn header_mode_requires_exact_path() {
        let err = header_config()
            .extract_early_data("/ws/extra", &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, ServerError::PathMismatch { .. }));
    }

    #[test]
    fn header_mode_ignores_query() {
        let early = header_config()
            .extract_early_data("/ws?x=1", &HeaderMap::new())
            .unwrap();
        assert!(early.is_none());
    }

    #[test]
    fn disabled_early_data_requires_exact_path() {
        let config = ServerConfig {
            path: "/ws".to_string(),
            ..ServerConfig::default()
        };
        assert!(config
            .extract_early_data("/ws", &HeaderMap::new())
            .unwrap()
            .is_none());
        assert!(config
            .extract_early_data("/wsAAAA", &HeaderMap::new())
            .is_err());
    }

    #[test]
    fn forwarded_for_replaces_ip_and_keeps_port() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR,
            HeaderValue::from_static("garbage, 198.51.100.4, 10.0.0.1"),
        );
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        assert_eq!(
            source_address(&headers, peer),
            "198.51.100.4:50000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn forwarded_for_accepts_ipv6() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static("2001:db8::1"));
        let peer: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        assert_eq!(
            source_address(&headers, peer),
            "[2001:db8::1]:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn missing_header_keeps_peer() {
        let peer: SocketAddr = "192.0.2.9:1234".parse().unwrap();
        assert_eq!(source_address(&HeaderMap::new(), peer), peer);
    }
}
