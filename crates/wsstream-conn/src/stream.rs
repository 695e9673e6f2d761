use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;
use wsstream_transport::{
    format_close_payload, CloseCode, ControlKind, FrameBuf, FrameWrite, MessageConn, MessageKind,
    MAX_FRAME_HEADER_LEN,
};

use crate::error::StreamError;
use crate::reader::FrameReader;

/// Leading bytes callers should leave free in a [`FrameBuf`] so the frame
/// header can be written in place.
pub const FRONT_HEADROOM: usize = MAX_FRAME_HEADER_LEN;

/// How long [`WsStream::close`] waits to send the close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A byte stream over an established message connection.
///
/// Reads concatenate incoming frames; each write becomes one outgoing frame.
/// `Read` and `Write` are implemented for `&WsStream` as well, so one thread
/// can read while another writes (wrap the stream in an `Arc`).
pub struct WsStream<C: MessageConn> {
    conn: C,
    reader: FrameReader<C::Frame>,
    writer: C::Writer,
    kind: MessageKind,
    remote_addr: Option<SocketAddr>,
    close_timeout: Duration,
    closed: AtomicBool,
}

impl<C: MessageConn> WsStream<C> {
    /// Wrap a client-side connection writing `kind` frames.
    pub fn new(conn: C, kind: MessageKind) -> Self {
        Self::build(conn, kind, None, FrameReader::new())
    }

    /// Wrap a server-side connection. Server streams always write binary frames.
    ///
    /// `remote_addr` overrides the transport's peer address, for servers that
    /// learn the real client address from a proxy header.
    pub fn server(conn: C, remote_addr: Option<SocketAddr>) -> Self {
        Self::build(conn, MessageKind::Binary, remote_addr, FrameReader::new())
    }

    /// Like [`server`](Self::server), replaying `early` (decoded from the
    /// upgrade request) ahead of the first frame.
    pub fn server_with_early_data(conn: C, remote_addr: Option<SocketAddr>, early: Bytes) -> Self {
        Self::build(
            conn,
            MessageKind::Binary,
            remote_addr,
            FrameReader::with_early_data(early),
        )
    }

    fn build(
        conn: C,
        kind: MessageKind,
        remote_addr: Option<SocketAddr>,
        reader: FrameReader<C::Frame>,
    ) -> Self {
        let writer = conn.frame_writer(kind);
        Self {
            conn,
            reader,
            writer,
            kind,
            remote_addr,
            close_timeout: CLOSE_TIMEOUT,
            closed: AtomicBool::new(false),
        }
    }

    /// Override the close-handshake timeout.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Read bytes from the incoming frames (blocking).
    ///
    /// `Ok(0)` means the peer closed the connection normally.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(&self.conn, buf)
    }

    /// Send `data` as one frame. An empty slice sends nothing.
    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        self.writer.write_frame(data)?;
        Ok(data.len())
    }

    /// Send the payload of `buf` as one frame. An empty payload sends nothing.
    pub fn send_buffer(&self, buf: FrameBuf) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.writer.write_frame_buf(buf)
    }

    /// Close the connection.
    ///
    /// Sends a normal close frame within the close timeout, then tears the
    /// transport down so blocked reads on this stream return. A teardown
    /// error is reported only when the close frame could not be sent. Calls
    /// after the first are no-ops.
    pub fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let payload = format_close_payload(CloseCode::Normal, "");
        let deadline = Instant::now() + self.close_timeout;
        match self.conn.write_control(ControlKind::Close, &payload, deadline) {
            Ok(()) => {
                if let Err(err) = self.conn.close() {
                    debug!(error = %err, "transport teardown after close frame failed");
                }
                Ok(())
            }
            Err(err) => {
                debug!(error = %err, "close frame not sent, closing transport");
                self.conn.close()
            }
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.conn.local_addr()
    }

    /// The override address given at construction, else the transport's.
    pub fn remote_addr(&self) -> io::Result<SocketAddr> {
        match self.remote_addr {
            Some(addr) => Ok(addr),
            None => self.conn.remote_addr(),
        }
    }

    /// Always fails with `InvalidInput`: the transport has no combined
    /// deadline. Use [`set_read_deadline`](Self::set_read_deadline) and
    /// [`set_write_deadline`](Self::set_write_deadline).
    pub fn set_deadline(&self, _deadline: Option<Instant>) -> io::Result<()> {
        Err(StreamError::DeadlineUnsupported.into())
    }

    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.conn.set_read_deadline(deadline)
    }

    pub fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.conn.set_write_deadline(deadline)
    }

    /// Bytes to reserve in front of buffers passed to
    /// [`send_buffer`](Self::send_buffer).
    pub fn front_headroom(&self) -> usize {
        FRONT_HEADROOM
    }

    /// Frame type used for outgoing data.
    pub fn message_kind(&self) -> MessageKind {
        self.kind
    }

    /// Borrow the underlying connection.
    pub fn get_ref(&self) -> &C {
        &self.conn
    }
}

impl<C: MessageConn> Read for WsStream<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<C: MessageConn> Read for &WsStream<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<C: MessageConn> Write for WsStream<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: MessageConn> Write for &WsStream<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: MessageConn> std::fmt::Debug for WsStream<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsStream")
            .field("kind", &self.kind)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
