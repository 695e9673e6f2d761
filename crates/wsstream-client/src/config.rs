use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use wsstream_conn::CLOSE_TIMEOUT;
use wsstream_transport::MessageKind;

use crate::early_data::EarlyDataCarrier;
use crate::error::{ClientError, Result};

/// Header that carries early data when none is configured explicitly.
///
/// Browsers are allowed to set it on upgrade requests, so it survives most
/// proxies.
pub const SEC_WEBSOCKET_PROTOCOL: &str = "Sec-WebSocket-Protocol";

/// Client configuration as written by users.
///
/// Every field is optional in serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target URI, e.g. `ws://example.com/ws`.
    pub uri: String,
    /// Extra headers sent with every upgrade request.
    pub headers: BTreeMap<String, String>,
    /// Largest early-data prefix. Zero dials eagerly without early data.
    pub max_early_data: usize,
    /// Header carrying early data. Unset or empty appends it to the URI.
    pub early_data_header_name: Option<String>,
    /// Send text frames instead of binary ones.
    pub text_frames: bool,
    /// How long `close` waits for the close frame to go out.
    pub close_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            headers: BTreeMap::new(),
            max_early_data: 0,
            early_data_header_name: None,
            text_frames: false,
            close_timeout_ms: CLOSE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    /// Config for `uri` with everything else defaulted.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Enable early data up to `max` bytes.
    pub fn with_max_early_data(mut self, max: usize) -> Self {
        self.max_early_data = max;
        self
    }

    /// Carry early data in `name` instead of the URI.
    pub fn with_early_data_header(mut self, name: impl Into<String>) -> Self {
        self.early_data_header_name = Some(name.into());
        self
    }

    /// Add a header to every upgrade request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Parse a JSON config document.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            ClientError::InvalidConfig(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Validate and convert into the form used when dialing.
    pub fn dial_options(&self) -> Result<DialOptions> {
        if self.uri.is_empty() {
            return Err(ClientError::InvalidConfig("uri must not be empty".into()));
        }

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidHeaderName(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::InvalidHeaderValue(name.clone()))?;
            headers.append(header, value);
        }

        let carrier = match self.early_data_header_name.as_deref() {
            None | Some("") => EarlyDataCarrier::Uri,
            Some(name) => EarlyDataCarrier::Header(
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ClientError::InvalidHeaderName(name.to_string()))?,
            ),
        };

        Ok(DialOptions {
            uri: self.uri.clone(),
            headers,
            max_early_data: self.max_early_data,
            carrier,
            kind: if self.text_frames {
                MessageKind::Text
            } else {
                MessageKind::Binary
            },
            close_timeout: Duration::from_millis(self.close_timeout_ms),
        })
    }
}

/// Validated client settings.
#[derive(Debug, Clone)]
pub struct DialOptions {
    pub(crate) uri: String,
    pub(crate) headers: HeaderMap,
    pub(crate) max_early_data: usize,
    pub(crate) carrier: EarlyDataCarrier,
    pub(crate) kind: MessageKind,
    pub(crate) close_timeout: Duration,
}

impl DialOptions {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn max_early_data(&self) -> usize {
        self.max_early_data
    }

    pub fn carrier(&self) -> &EarlyDataCarrier {
        &self.carrier
    }

    pub fn message_kind(&self) -> MessageKind {
        self.kind
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }
}
