//! Client stream that defers the WebSocket dial to the first write.
//!
//! The head of the first write travels inside the upgrade request, which
//! saves a round trip for protocols whose client speaks first. Until that
//! write happens there is no connection: readers block, and address and
//! deadline queries fail.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use wsstream_conn::{WsStream, FRONT_HEADROOM};
use wsstream_transport::{Dialer, FrameBuf};

use crate::config::DialOptions;
use crate::early_data::DialPlan;
use crate::error::{wrap_dial_error, ClientError};
use crate::signal::OneShot;

/// Why the dial failed, as seen by callers that did not perform it.
#[derive(Debug, Clone)]
struct Failure {
    kind: io::ErrorKind,
    message: String,
}

impl Failure {
    fn to_io(&self) -> io::Error {
        ClientError::DialFailed {
            kind: self.kind,
            message: self.message.clone(),
        }
        .into()
    }
}

#[derive(Debug, Clone)]
enum DialState {
    Idle,
    Dialing,
    Connected,
    Failed(Failure),
}

/// Outcome published to callers waiting on the dial.
#[derive(Debug, Clone)]
enum Outcome {
    Connected,
    Failed(Failure),
}

/// A byte stream whose connection is established by its first write.
///
/// At most one dial is ever attempted. A failed dial leaves the stream
/// permanently failed; every later operation that needs the connection
/// reports that failure.
pub struct EarlyStream<D: Dialer> {
    dialer: Arc<D>,
    options: Arc<DialOptions>,
    ctx: CancellationToken,
    state: Mutex<DialState>,
    conn: OnceLock<WsStream<D::Conn>>,
    done: OneShot<Outcome>,
}

impl<D: Dialer> EarlyStream<D> {
    /// Stream that will dial through `dialer` with `options` on first write.
    ///
    /// `ctx` is consulted by the dial, not afterwards.
    pub fn new(dialer: Arc<D>, options: Arc<DialOptions>, ctx: CancellationToken) -> Self {
        Self {
            dialer,
            options,
            ctx,
            state: Mutex::new(DialState::Idle),
            conn: OnceLock::new(),
            done: OneShot::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DialState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the connection is up.
    pub fn is_connected(&self) -> bool {
        self.conn.get().is_some()
    }

    /// The established connection, if any.
    pub fn get_ref(&self) -> Option<&WsStream<D::Conn>> {
        self.conn.get()
    }

    /// Block until some writer has finished the dial.
    fn wait_for_dial(&self) -> io::Result<&WsStream<D::Conn>> {
        match self.done.wait() {
            Outcome::Connected => self.established(),
            Outcome::Failed(failure) => Err(failure.to_io()),
        }
    }

    fn established(&self) -> io::Result<&WsStream<D::Conn>> {
        self.conn.get().ok_or_else(not_connected)
    }

    /// Take responsibility for the dial, or get the stream once it exists.
    ///
    /// `Ok(None)` means the caller now owns the dial and must finish it
    /// through [`Self::establish`].
    fn claim(&self) -> io::Result<Option<&WsStream<D::Conn>>> {
        let mut state = self.lock_state();
        match state.clone() {
            DialState::Idle => {
                *state = DialState::Dialing;
                Ok(None)
            }
            DialState::Dialing => {
                drop(state);
                self.wait_for_dial().map(Some)
            }
            DialState::Connected => self.established().map(Some),
            DialState::Failed(failure) => Err(failure.to_io()),
        }
    }

    /// Dial with the head of `data` as early data.
    ///
    /// Returns the stream and how many bytes of `data` the handshake carried.
    fn establish(&self, data: &[u8]) -> io::Result<(&WsStream<D::Conn>, usize)> {
        let plan = match DialPlan::for_first_write(&self.options, data) {
            Ok(plan) => plan,
            Err(err) => return Err(self.fail(err)),
        };
        debug!(
            uri = %self.options.uri,
            early = plan.early_len,
            late = plan.late_len,
            "dialing websocket with early data"
        );

        let (conn, response) = match self.dialer.dial(&self.ctx, &plan.uri, &plan.headers) {
            Ok(established) => established,
            Err(err) => return Err(self.fail(wrap_dial_error(err))),
        };
        debug!(status = %response.status(), "websocket established");

        let stream = WsStream::new(conn, self.options.kind)
            .with_close_timeout(self.options.close_timeout);
        let stream = self.conn.get_or_init(move || stream);
        *self.lock_state() = DialState::Connected;
        self.done.fire(Outcome::Connected);
        Ok((stream, plan.early_len))
    }

    fn fail(&self, err: ClientError) -> io::Error {
        debug!(uri = %self.options.uri, error = %err, "websocket dial failed");
        let mut err = io::Error::from(err);
        if err.kind() == io::ErrorKind::Interrupted {
            // `write_all` retries Interrupted, but this failure is final.
            err = io::Error::other(err);
        }
        let failure = Failure {
            kind: err.kind(),
            message: err.to_string(),
        };
        *self.lock_state() = DialState::Failed(failure.clone());
        self.done.fire(Outcome::Failed(failure));
        err
    }

    /// Read bytes, blocking until the first write has established the
    /// connection.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.conn.get() {
            Some(stream) => stream.recv(buf),
            None => self.wait_for_dial()?.recv(buf),
        }
    }

    /// Write `data`. The first call dials.
    ///
    /// On the dialing call, the head of `data` goes in the handshake and any
    /// remainder follows as one frame. The full length of `data` is
    /// reported on success.
    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        if let Some(stream) = self.conn.get() {
            return stream.send(data);
        }
        if let Some(stream) = self.claim()? {
            return stream.send(data);
        }

        let (stream, early_len) = self.establish(data)?;
        let late = &data[early_len..];
        if !late.is_empty() {
            stream.send(late)?;
        }
        Ok(data.len())
    }

    /// Write the payload of `buf`, same as [`Self::send`].
    pub fn send_buffer(&self, buf: FrameBuf) -> io::Result<()> {
        if let Some(stream) = self.conn.get() {
            return stream.send_buffer(buf);
        }
        if let Some(stream) = self.claim()? {
            return stream.send_buffer(buf);
        }

        let (stream, early_len) = self.establish(buf.payload())?;
        let late = &buf.payload()[early_len..];
        if !late.is_empty() {
            stream.send(late)?;
        }
        Ok(())
    }

    /// Close the connection. Does nothing if it was never established.
    pub fn close(&self) -> io::Result<()> {
        match self.conn.get() {
            Some(stream) => stream.close(),
            None => Ok(()),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.established()?.local_addr()
    }

    pub fn remote_addr(&self) -> io::Result<SocketAddr> {
        self.established()?.remote_addr()
    }

    /// Always fails; combined deadlines are not supported.
    pub fn set_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        match self.conn.get() {
            Some(stream) => stream.set_deadline(deadline),
            None => Err(no_deadline_yet()),
        }
    }

    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        match self.conn.get() {
            Some(stream) => stream.set_read_deadline(deadline),
            None => Err(no_deadline_yet()),
        }
    }

    pub fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        match self.conn.get() {
            Some(stream) => stream.set_write_deadline(deadline),
            None => Err(no_deadline_yet()),
        }
    }

    /// Bytes a caller should reserve in front of buffers passed to
    /// [`Self::send_buffer`].
    pub fn front_headroom(&self) -> usize {
        FRONT_HEADROOM
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "websocket not dialed yet")
}

fn no_deadline_yet() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        "deadlines need an established websocket",
    )
}

impl<D: Dialer> Read for EarlyStream<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<D: Dialer> Read for &EarlyStream<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<D: Dialer> Write for EarlyStream<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: Dialer> Write for &EarlyStream<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: Dialer> std::fmt::Debug for EarlyStream<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EarlyStream")
            .field("uri", &self.options.uri)
            .field("state", &*self.lock_state())
            .finish()
    }
}
