//! Message-transport seams for wsstream.
//!
//! wsstream adapts a message-oriented duplex connection (a WebSocket) into a
//! byte stream. This crate defines what it needs from the layers underneath:
//! - [`MessageConn`]: an established connection delivering whole frames
//! - [`FrameWrite`]: the per-connection frame writer
//! - [`Dialer`]: the outbound upgrade handshake
//!
//! It also provides the close-code vocabulary, the [`FrameBuf`] buffer used
//! for in-place header writes, and an in-process transport ([`memory`]) that
//! implements all three seams.

pub mod buffer;
pub mod close;
pub mod error;
pub mod memory;
pub mod traits;

pub use buffer::{FrameBuf, MAX_FRAME_HEADER_LEN};
pub use close::{format_close_payload, parse_close_payload, CloseCode};
pub use error::{close_error, CloseError, DialError};
pub use traits::{ControlKind, Dialer, FrameWrite, HandshakeResponse, MessageConn, MessageKind};
