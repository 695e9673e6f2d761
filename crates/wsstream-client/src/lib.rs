//! WebSocket client byte streams.
//!
//! [`WsClient`] dials through any [`Dialer`](wsstream_transport::Dialer).
//! With `max_early_data` set, the dial waits for the first write and carries
//! its head inside the upgrade request ([`EarlyStream`]).

pub mod client;
pub mod config;
pub mod early;
pub mod early_data;
pub mod error;
mod signal;

pub use client::{ClientStream, WsClient};
pub use config::{ClientConfig, DialOptions, SEC_WEBSOCKET_PROTOCOL};
pub use early::EarlyStream;
pub use early_data::{
    encode_early_data, split_early_data, DialPlan, EarlyDataCarrier, PlanSummary,
};
pub use error::{wrap_dial_error, ClientError, Result};
