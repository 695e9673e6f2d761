use std::io;

use bytes::{BufMut, Bytes, BytesMut};

/// Largest WebSocket frame header: 2 fixed bytes, 8 extended-length bytes,
/// 4 masking-key bytes.
pub const MAX_FRAME_HEADER_LEN: usize = 14;

/// Outgoing payload buffer with reserved space in front of the payload.
///
/// Writers prepend their frame header into the headroom instead of copying
/// the payload into a fresh allocation.
///
/// ```text
/// ┌────────────────────┬──────────────────────────┐
/// │ headroom (unused)  │ payload                  │
/// └────────────────────┴──────────────────────────┘
///                      ^ start
/// ```
#[derive(Debug, Clone)]
pub struct FrameBuf {
    data: BytesMut,
    start: usize,
}

impl FrameBuf {
    /// Empty buffer reserving `headroom` leading bytes.
    pub fn with_headroom(headroom: usize) -> Self {
        Self::with_capacity(headroom, 0)
    }

    /// Empty buffer reserving `headroom` leading bytes and room for `capacity`
    /// payload bytes.
    pub fn with_capacity(headroom: usize, capacity: usize) -> Self {
        let mut data = BytesMut::with_capacity(headroom + capacity);
        data.resize(headroom, 0);
        Self {
            data,
            start: headroom,
        }
    }

    /// Buffer holding a copy of `payload` behind `headroom` leading bytes.
    pub fn from_payload(headroom: usize, payload: &[u8]) -> Self {
        let mut buf = Self::with_capacity(headroom, payload.len());
        buf.extend_from_slice(payload);
        buf
    }

    /// Bytes still free in front of the payload.
    pub fn headroom(&self) -> usize {
        self.start
    }

    /// Payload length, excluding headroom.
    pub fn len(&self) -> usize {
        self.data.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload (everything after the headroom).
    pub fn payload(&self) -> &[u8] {
        &self.data[self.start..]
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Write `header` into the headroom directly in front of the payload.
    ///
    /// After a successful call the header is part of [`payload`](Self::payload).
    pub fn prepend(&mut self, header: &[u8]) -> io::Result<()> {
        if header.len() > self.start {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "header of {} bytes exceeds headroom of {} bytes",
                    header.len(),
                    self.start
                ),
            ));
        }
        let new_start = self.start - header.len();
        self.data[new_start..self.start].copy_from_slice(header);
        self.start = new_start;
        Ok(())
    }

    /// Hand off the payload without copying it.
    pub fn freeze(mut self) -> Bytes {
        self.data.split_off(self.start).freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_excludes_headroom() {
        let buf = FrameBuf::from_payload(MAX_FRAME_HEADER_LEN, b"hello");
        assert_eq!(buf.headroom(), MAX_FRAME_HEADER_LEN);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.payload(), b"hello");
    }

    #[test]
    fn prepend_consumes_headroom_in_place() {
        let mut buf = FrameBuf::from_payload(4, b"body");
        buf.prepend(&[0x82, 0x04]).unwrap();

        assert_eq!(buf.headroom(), 2);
        assert_eq!(buf.payload(), &[0x82, 0x04, b'b', b'o', b'd', b'y']);
    }

    #[test]
    fn prepend_rejects_oversized_header() {
        let mut buf = FrameBuf::from_payload(1, b"x");
        let err = buf.prepend(&[1, 2]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(buf.payload(), b"x");
    }

    #[test]
    fn freeze_returns_payload_only() {
        let mut buf = FrameBuf::with_headroom(8);
        buf.extend_from_slice(b"abc");
        buf.extend_from_slice(b"def");
        assert_eq!(buf.freeze().as_ref(), b"abcdef");
    }

    #[test]
    fn empty_buffer() {
        let buf = FrameBuf::with_headroom(MAX_FRAME_HEADER_LEN);
        assert!(buf.is_empty());
        assert!(buf.freeze().is_empty());
    }
}
