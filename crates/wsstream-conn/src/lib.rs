//! Byte-stream adapter over an established WebSocket message connection.
//!
//! [`WsStream`] turns a [`MessageConn`](wsstream_transport::MessageConn) into
//! something that reads and writes like a socket:
//! - reads span frame boundaries transparently
//! - a normal close reads as end of stream, an abnormal one as an error
//! - each write goes out as one binary (or text) frame

pub mod error;
pub mod reader;
pub mod server;
pub mod stream;
pub mod translate;

pub use error::{is_connection_closed, ServerError, StreamError};
pub use reader::FrameReader;
pub use server::{source_address, ServerConfig};
pub use stream::{WsStream, CLOSE_TIMEOUT, FRONT_HEADROOM};
pub use translate::{translate, Translated};
