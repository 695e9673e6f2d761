use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use http::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::buffer::FrameBuf;
use crate::error::DialError;

/// Response received during the upgrade handshake.
pub type HandshakeResponse = http::Response<Bytes>;

/// Data frame type. Fixed per writer at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    #[default]
    Binary,
    Text,
}

/// Control frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Close,
    Ping,
    Pong,
}

/// An established message-oriented duplex connection.
///
/// All methods take `&self`: one thread may block in [`next_frame`] while
/// another writes through a [`FrameWrite`] obtained from [`frame_writer`].
/// Implementations must make [`close`] unblock any pending [`next_frame`]
/// call.
///
/// Close signals are reported as `io::Error`s wrapping a
/// [`CloseError`](crate::CloseError).
///
/// [`next_frame`]: MessageConn::next_frame
/// [`frame_writer`]: MessageConn::frame_writer
/// [`close`]: MessageConn::close
pub trait MessageConn: Send + Sync {
    /// Reader over the payload of one incoming frame. `Ok(0)` marks the end of
    /// that frame, not of the connection.
    type Frame: Read + Send;

    /// Writer used for outgoing data frames.
    type Writer: FrameWrite;

    /// Block until the next incoming data frame starts.
    fn next_frame(&self) -> io::Result<(MessageKind, Self::Frame)>;

    /// Create a frame writer bound to this connection that emits `kind` frames.
    fn frame_writer(&self, kind: MessageKind) -> Self::Writer;

    /// Send a control frame, giving up once `deadline` passes.
    fn write_control(&self, kind: ControlKind, payload: &[u8], deadline: Instant)
        -> io::Result<()>;

    /// Tear down the connection without a close handshake.
    fn close(&self) -> io::Result<()>;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    fn remote_addr(&self) -> io::Result<SocketAddr>;

    /// `None` clears the deadline.
    fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()>;

    /// `None` clears the deadline.
    fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()>;
}

/// Encodes outgoing bytes as one data frame each.
pub trait FrameWrite: Send + Sync {
    /// Write `data` as a single frame.
    fn write_frame(&self, data: &[u8]) -> io::Result<()>;

    /// Write the payload of `buf` as a single frame.
    ///
    /// Writers that serialize their header in place use the buffer's front
    /// headroom; the default falls back to a copying write.
    fn write_frame_buf(&self, buf: FrameBuf) -> io::Result<()> {
        self.write_frame(buf.payload())
    }
}

/// Performs the outbound upgrade handshake.
pub trait Dialer: Send + Sync {
    type Conn: MessageConn;

    /// Dial `uri` with `headers`. Cancelling `ctx` aborts the handshake.
    fn dial(
        &self,
        ctx: &CancellationToken,
        uri: &str,
        headers: &HeaderMap,
    ) -> Result<(Self::Conn, HandshakeResponse), DialError>;
}

impl<D: Dialer + ?Sized> Dialer for std::sync::Arc<D> {
    type Conn = D::Conn;

    fn dial(
        &self,
        ctx: &CancellationToken,
        uri: &str,
        headers: &HeaderMap,
    ) -> Result<(Self::Conn, HandshakeResponse), DialError> {
        (**self).dial(ctx, uri, headers)
    }
}
