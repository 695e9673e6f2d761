//! Handshake planning for the first write.
//!
//! Up to `max_early_data` bytes of the first write ride along with the
//! upgrade request, encoded as unpadded URL-safe base64. The remainder
//! ("late data") goes out as an ordinary frame once the connection is up.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde::Serialize;

use crate::config::DialOptions;
use crate::error::{ClientError, Result};

/// Where encoded early data is placed in the upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EarlyDataCarrier {
    /// Appended verbatim to the request URI.
    Uri,
    /// Sent as the value of this header, replacing any configured value.
    Header(HeaderName),
}

/// Split `data` into the early prefix (at most `max` bytes) and the rest.
pub fn split_early_data(data: &[u8], max: usize) -> (&[u8], &[u8]) {
    data.split_at(data.len().min(max))
}

/// Encode early data the way it travels in the handshake.
pub fn encode_early_data(early: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(early)
}

/// Upgrade request for a given first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialPlan {
    /// Request URI, with early data appended in URI mode.
    pub uri: String,
    /// Request headers, with the early-data header set in header mode.
    pub headers: HeaderMap,
    /// Bytes of the first write carried by the handshake.
    pub early_len: usize,
    /// Bytes of the first write sent as a frame after the handshake.
    pub late_len: usize,
}

impl DialPlan {
    /// Plan the handshake that carries the head of `data`.
    ///
    /// An empty early prefix leaves the URI and headers untouched.
    pub fn for_first_write(options: &DialOptions, data: &[u8]) -> Result<Self> {
        let (early, late) = split_early_data(data, options.max_early_data);
        let mut uri = options.uri.clone();
        let mut headers = options.headers.clone();

        if !early.is_empty() {
            let encoded = encode_early_data(early);
            match &options.carrier {
                EarlyDataCarrier::Uri => uri.push_str(&encoded),
                EarlyDataCarrier::Header(name) => {
                    let value = HeaderValue::from_str(&encoded)
                        .map_err(|_| ClientError::InvalidHeaderValue(name.to_string()))?;
                    headers.insert(name.clone(), value);
                }
            }
        }

        Ok(Self {
            uri,
            headers,
            early_len: early.len(),
            late_len: late.len(),
        })
    }

    /// Serializable summary, for display.
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            uri: self.uri.clone(),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            early_len: self.early_len,
            late_len: self.late_len,
        }
    }
}

/// Display form of a [`DialPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub early_len: usize,
    pub late_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, SEC_WEBSOCKET_PROTOCOL};

    fn options(max: usize, header: Option<&str>) -> DialOptions {
        let mut config = ClientConfig::new("ws://example.com/ws").with_max_early_data(max);
        if let Some(header) = header {
            config = config.with_early_data_header(header);
        }
        config.dial_options().unwrap()
    }

    #[test]
    fn split_caps_early_prefix() {
        assert_eq!(split_early_data(b"abcdef", 4), (&b"abcd"[..], &b"ef"[..]));
        assert_eq!(split_early_data(b"ab", 4), (&b"ab"[..], &b""[..]));
        assert_eq!(split_early_data(b"", 4), (&b""[..], &b""[..]));
    }

    #[test]
    fn encoding_is_unpadded_url_safe() {
        assert_eq!(encode_early_data(&[0xfb, 0xff]), "-_8");
        assert_eq!(encode_early_data(b"AAAA"), "QUFBQQ");
    }

    #[test]
    fn uri_mode_appends_encoding() {
        let plan = DialPlan::for_first_write(&options(16, None), b"hello").unwrap();
        assert_eq!(plan.uri, "ws://example.com/wsaGVsbG8");
        assert!(plan.headers.is_empty());
        assert_eq!((plan.early_len, plan.late_len), (5, 0));
    }

    #[test]
    fn header_mode_sets_header() {
        let plan = DialPlan::for_first_write(
            &options(4, Some(SEC_WEBSOCKET_PROTOCOL)),
            b"AAAAXX",
        )
        .unwrap();
        assert_eq!(plan.uri, "ws://example.com/ws");
        assert_eq!(plan.headers[SEC_WEBSOCKET_PROTOCOL], "QUFBQQ");
        assert_eq!((plan.early_len, plan.late_len), (4, 2));
    }

    #[test]
    fn header_mode_replaces_configured_value() {
        let options = ClientConfig::new("ws://example.com/ws")
            .with_max_early_data(8)
            .with_early_data_header(SEC_WEBSOCKET_PROTOCOL)
            .with_header(SEC_WEBSOCKET_PROTOCOL, "chat")
            .dial_options()
            .unwrap();
        let plan = DialPlan::for_first_write(&options, b"hi").unwrap();
        let values: Vec<_> = plan.headers.get_all(SEC_WEBSOCKET_PROTOCOL).iter().collect();
        assert_eq!(values, ["aGk"]);
    }

    #[test]
    fn empty_write_adds_nothing() {
        for header in [None, Some(SEC_WEBSOCKET_PROTOCOL)] {
            let plan = DialPlan::for_first_write(&options(16, header), b"").unwrap();
            assert_eq!(plan.uri, "ws://example.com/ws");
            assert!(plan.headers.is_empty());
            assert_eq!((plan.early_len, plan.late_len), (0, 0));
        }
    }

    #[test]
    fn summary_lists_headers() {
        let plan = DialPlan::for_first_write(
            &options(16, Some(SEC_WEBSOCKET_PROTOCOL)),
            b"hi",
        )
        .unwrap();
        let summary = plan.summary();
        assert_eq!(
            summary.headers,
            vec![("sec-websocket-protocol".to_string(), "aGk".to_string())]
        );
    }
}
