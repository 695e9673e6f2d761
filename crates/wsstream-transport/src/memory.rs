//! In-process message transport.
//!
//! [`pair`] returns two connected endpoints that exchange whole frames through
//! shared queues, with the close semantics of a real WebSocket: a close
//! control frame reaches the peer as a [`CloseError`] with the sent code,
//! while closing or dropping an endpoint without one reaches the peer as
//! [`CloseCode::Abnormal`]. [`MemoryDialer`] hands out such pairs from a
//! [`Dialer`] and records every handshake request.

use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::buffer::FrameBuf;
use crate::close::{parse_close_payload, CloseCode};
use crate::error::{CloseError, DialError};
use crate::traits::{ControlKind, Dialer, FrameWrite, HandshakeResponse, MessageConn, MessageKind};

static NEXT_PORT: AtomicU16 = AtomicU16::new(40_000);

enum Item {
    Data(MessageKind, Bytes),
    Close(CloseError),
}

#[derive(Default)]
struct Mailbox {
    queue: VecDeque<Item>,
    /// First close observed by the reader; returned on every later read.
    terminal: Option<CloseError>,
    /// The owning endpoint closed itself.
    shut: bool,
}

#[derive(Default)]
struct Pipe {
    mailbox: Mutex<Mailbox>,
    ready: Condvar,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, Mailbox> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, item: Item) -> io::Result<()> {
        let mut mailbox = self.lock();
        if mailbox.shut {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer closed the connection",
            ));
        }
        mailbox.queue.push_back(item);
        self.ready.notify_all();
        Ok(())
    }
}

/// State shared between an endpoint and the writers it hands out.
struct WriteSide {
    outbox: Arc<Pipe>,
    /// Set after a close frame was sent or the endpoint was closed.
    done: AtomicBool,
    deadline: Mutex<Option<Instant>>,
}

impl WriteSide {
    fn check(&self) -> io::Result<()> {
        if self.done.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "use of closed connection",
            ));
        }
        let deadline = *self.deadline.lock().unwrap_or_else(PoisonError::into_inner);
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "write deadline exceeded",
            ));
        }
        Ok(())
    }

    fn send(&self, kind: MessageKind, payload: Bytes) -> io::Result<()> {
        self.check()?;
        trace!(len = payload.len(), ?kind, "memory frame sent");
        self.outbox.push(Item::Data(kind, payload))
    }
}

/// One endpoint of an in-memory message connection.
pub struct MemoryConn {
    inbox: Arc<Pipe>,
    write: Arc<WriteSide>,
    read_deadline: Mutex<Option<Instant>>,
    local: SocketAddr,
    remote: SocketAddr,
}

/// Create two connected endpoints.
pub fn pair() -> (MemoryConn, MemoryConn) {
    let a = loopback_addr();
    let b = loopback_addr();
    pair_with_addrs(a, b)
}

/// Create two connected endpoints with explicit addresses.
pub fn pair_with_addrs(a: SocketAddr, b: SocketAddr) -> (MemoryConn, MemoryConn) {
    let a_to_b = Arc::new(Pipe::default());
    let b_to_a = Arc::new(Pipe::default());
    let first = MemoryConn::new(Arc::clone(&b_to_a), Arc::clone(&a_to_b), a, b);
    let second = MemoryConn::new(a_to_b, b_to_a, b, a);
    (first, second)
}

fn loopback_addr() -> SocketAddr {
    let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

impl MemoryConn {
    fn new(inbox: Arc<Pipe>, outbox: Arc<Pipe>, local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            inbox,
            write: Arc::new(WriteSide {
                outbox,
                done: AtomicBool::new(false),
                deadline: Mutex::new(None),
            }),
            read_deadline: Mutex::new(None),
            local,
            remote,
        }
    }

    fn shutdown(&self) {
        {
            let mut inbox = self.inbox.lock();
            if inbox.shut {
                return;
            }
            inbox.shut = true;
            self.inbox.ready.notify_all();
        }
        self.write.done.store(true, Ordering::Release);
        // The peer learns about a vanished endpoint the way a real transport
        // reports a dropped TCP connection.
        let _ = self
            .write
            .outbox
            .push(Item::Close(CloseError::new(CloseCode::Abnormal, "")));
        debug!(local = %self.local, remote = %self.remote, "memory connection closed");
    }
}

impl MessageConn for MemoryConn {
    type Frame = Cursor<Bytes>;
    type Writer = MemoryWriter;

    fn next_frame(&self) -> io::Result<(MessageKind, Self::Frame)> {
        let mut inbox = self.inbox.lock();
        loop {
            if inbox.shut {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "use of closed connection",
                ));
            }
            if let Some(terminal) = &inbox.terminal {
                return Err(terminal.clone().into_io());
            }
            match inbox.queue.pop_front() {
                Some(Item::Data(kind, payload)) => return Ok((kind, Cursor::new(payload))),
                Some(Item::Close(close)) => {
                    inbox.terminal = Some(close);
                    continue;
                }
                None => {}
            }

            let deadline = *self
                .read_deadline
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            inbox = match deadline {
                None => self
                    .inbox
                    .ready
                    .wait(inbox)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "read deadline exceeded",
                        ));
                    }
                    self.inbox
                        .ready
                        .wait_timeout(inbox, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn frame_writer(&self, kind: MessageKind) -> Self::Writer {
        MemoryWriter {
            side: Arc::clone(&self.write),
            kind,
        }
    }

    fn write_control(
        &self,
        kind: ControlKind,
        payload: &[u8],
        deadline: Instant,
    ) -> io::Result<()> {
        if Instant::now() >= deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "control frame deadline exceeded",
            ));
        }
        match kind {
            ControlKind::Close => {
                self.write.check()?;
                let (code, reason) = parse_close_payload(payload).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "malformed close payload")
                })?;
                self.write.done.store(true, Ordering::Release);
                self.write
                    .outbox
                    .push(Item::Close(CloseError::new(code, reason)))
            }
            ControlKind::Ping | ControlKind::Pong => self.write.check(),
        }
    }

    fn close(&self) -> io::Result<()> {
        self.shutdown();
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }

    fn remote_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.remote)
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        *self
            .read_deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = deadline;
        // Wake blocked readers so they re-evaluate the new deadline.
        self.inbox.ready.notify_all();
        Ok(())
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        *self
            .write
            .deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = deadline;
        Ok(())
    }
}

impl Drop for MemoryConn {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MemoryConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConn")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .finish()
    }
}

/// Frame writer for a [`MemoryConn`].
pub struct MemoryWriter {
    side: Arc<WriteSide>,
    kind: MessageKind,
}

impl FrameWrite for MemoryWriter {
    fn write_frame(&self, data: &[u8]) -> io::Result<()> {
        self.side.send(self.kind, Bytes::copy_from_slice(data))
    }

    fn write_frame_buf(&self, buf: FrameBuf) -> io::Result<()> {
        self.side.send(self.kind, buf.freeze())
    }
}

/// A handshake request observed by a [`MemoryDialer`].
#[derive(Debug, Clone)]
pub struct DialRecord {
    pub uri: String,
    pub headers: HeaderMap,
}

/// Server side of a successful in-memory dial.
#[derive(Debug)]
pub struct Accepted {
    pub request: DialRecord,
    pub conn: MemoryConn,
}

#[derive(Default)]
struct DialerState {
    requests: Vec<DialRecord>,
    reject: Option<(StatusCode, Bytes)>,
    delay: Option<Duration>,
}

/// A [`Dialer`] that connects to an in-process acceptor.
pub struct MemoryDialer {
    state: Mutex<DialerState>,
    dials: AtomicUsize,
    accepted_tx: mpsc::Sender<Accepted>,
    accepted_rx: Mutex<mpsc::Receiver<Accepted>>,
}

impl MemoryDialer {
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::channel();
        Self {
            state: Mutex::new(DialerState::default()),
            dials: AtomicUsize::new(0),
            accepted_tx,
            accepted_rx: Mutex::new(accepted_rx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DialerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse every subsequent upgrade with `status` and `body`.
    pub fn reject_with(&self, status: StatusCode, body: impl Into<Bytes>) {
        self.lock().reject = Some((status, body.into()));
    }

    /// Stall each handshake for `delay` before completing it.
    pub fn set_handshake_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Number of handshakes attempted so far.
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Handshake requests received so far, in order.
    pub fn requests(&self) -> Vec<DialRecord> {
        self.lock().requests.clone()
    }

    /// Wait for the next successful dial.
    pub fn accept(&self) -> io::Result<Accepted> {
        self.accepted_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "dialer dropped"))
    }

    /// Wait up to `timeout` for the next successful dial.
    pub fn accept_timeout(&self, timeout: Duration) -> io::Result<Accepted> {
        self.accepted_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(timeout)
            .map_err(|err| match err {
                mpsc::RecvTimeoutError::Timeout => {
                    io::Error::new(io::ErrorKind::TimedOut, "no dial within timeout")
                }
                mpsc::RecvTimeoutError::Disconnected => {
                    io::Error::new(io::ErrorKind::BrokenPipe, "dialer dropped")
                }
            })
    }

    fn stall(ctx: &CancellationToken, delay: Duration) -> Result<(), DialError> {
        let until = Instant::now() + delay;
        while Instant::now() < until {
            if ctx.is_cancelled() {
                return Err(cancelled());
            }
            let remaining = until.saturating_duration_since(Instant::now());
            std::thread::sleep(Duration::from_millis(2).min(remaining));
        }
        Ok(())
    }
}

impl Default for MemoryDialer {
    fn default() -> Self {
        Self::new()
    }
}

fn cancelled() -> DialError {
    DialError::new(io::Error::other("dial cancelled"))
}

impl Dialer for MemoryDialer {
    type Conn = MemoryConn;

    fn dial(
        &self,
        ctx: &CancellationToken,
        uri: &str,
        headers: &HeaderMap,
    ) -> Result<(Self::Conn, HandshakeResponse), DialError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if ctx.is_cancelled() {
            return Err(cancelled());
        }

        let request = DialRecord {
            uri: uri.to_string(),
            headers: headers.clone(),
        };
        let (reject, delay) = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            (state.reject.clone(), state.delay)
        };
        debug!(uri, "memory dial");

        if let Some(delay) = delay {
            Self::stall(ctx, delay)?;
        }

        if let Some((status, body)) = reject {
            let mut response = HandshakeResponse::new(body);
            *response.status_mut() = status;
            return Err(DialError::with_response(
                io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("unexpected status {}", status.as_u16()),
                ),
                response,
            ));
        }

        let (client, server) = pair();
        // A dropped acceptor leaves the server end unowned; the client then
        // observes an abnormal closure on its first read.
        let _ = self.accepted_tx.send(Accepted {
            request,
            conn: server,
        });

        let mut response = HandshakeResponse::new(Bytes::new());
        *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
        Ok((client, response))
    }
}
