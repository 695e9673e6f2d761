//! WebSocket connections as plain byte streams.
//!
//! wsstream adapts message-oriented WebSocket connections to `Read`/`Write`
//! and lets clients carry the head of their first write inside the upgrade
//! request ("early data").
//!
//! # Crate Structure
//!
//! - [`transport`]: message-connection and dialer traits, close codes, the
//!   in-memory transport
//! - [`conn`]: the byte-stream adapter and server-side early-data helpers
//! - [`client`]: lazily dialed client streams (behind the `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use wsstream_transport::*;
}

/// Re-export stream adapter types.
pub mod conn {
    pub use wsstream_conn::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use wsstream_client::*;
}
