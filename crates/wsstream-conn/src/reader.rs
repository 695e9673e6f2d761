use std::io::{Cursor, ErrorKind, Read};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use wsstream_transport::MessageConn;

use crate::translate::translate;

/// The frame currently being consumed.
enum Cursored<F> {
    /// Early data decoded from the upgrade request, read before any frame.
    Early(Cursor<Bytes>),
    Frame(F),
}

impl<F: Read> Read for Cursored<F> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Cursored::Early(early) => early.read(buf),
            Cursored::Frame(frame) => frame.read(buf),
        }
    }
}

/// Reads a byte stream out of successive incoming frames.
///
/// Holds at most one in-progress frame. When it runs dry the next one is
/// fetched from the connection, so frame boundaries never show up as short
/// or empty reads.
pub struct FrameReader<F> {
    current: Mutex<Option<Cursored<F>>>,
}

impl<F: Read> FrameReader<F> {
    /// Reader with no frame in progress.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Reader that yields `early` before the first transport frame.
    pub fn with_early_data(early: Bytes) -> Self {
        let current = if early.is_empty() {
            None
        } else {
            Some(Cursored::Early(Cursor::new(early)))
        };
        Self {
            current: Mutex::new(current),
        }
    }

    /// Read bytes, fetching frames from `conn` as needed (blocking).
    ///
    /// Returns `Ok(0)` only for an empty `buf` or after a normal closure.
    pub fn read<C>(&self, conn: &C, buf: &mut [u8]) -> std::io::Result<usize>
    where
        C: MessageConn<Frame = F>,
    {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if current.is_none() {
                match conn.next_frame() {
                    Ok((_, frame)) => *current = Some(Cursored::Frame(frame)),
                    Err(err) => return translate(err).into_read_result(),
                }
            }
            let Some(frame) = current.as_mut() else {
                continue;
            };

            match frame.read(buf) {
                Ok(0) => {
                    *current = None;
                }
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    *current = None;
                    return translate(err).into_read_result();
                }
            }
        }
    }
}

impl<F: Read> Default for FrameReader<F> {
    fn default() -> Self {
        Self::new()
    }
}
