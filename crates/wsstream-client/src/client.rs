use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use wsstream_conn::WsStream;
use wsstream_transport::{Dialer, FrameBuf};

use crate::config::{ClientConfig, DialOptions};
use crate::early::EarlyStream;
use crate::error::{wrap_dial_error, Result};

/// Opens client byte streams to one configured endpoint.
pub struct WsClient<D: Dialer> {
    dialer: Arc<D>,
    options: Arc<DialOptions>,
}

impl<D: Dialer> WsClient<D> {
    /// Validate `config` and bind it to `dialer`.
    pub fn new(dialer: D, config: &ClientConfig) -> Result<Self> {
        Self::with_shared_dialer(Arc::new(dialer), config)
    }

    /// Like [`Self::new`], for a dialer shared with other owners.
    pub fn with_shared_dialer(dialer: Arc<D>, config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            dialer,
            options: Arc::new(config.dial_options()?),
        })
    }

    pub fn options(&self) -> &DialOptions {
        &self.options
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Open a stream.
    ///
    /// Without early data the dial happens now and its errors are returned
    /// here. With early data nothing is sent until the first write.
    pub fn connect(&self, ctx: CancellationToken) -> Result<ClientStream<D>> {
        if self.options.max_early_data() == 0 {
            debug!(uri = %self.options.uri(), "dialing websocket");
            let (conn, _response) = self
                .dialer
                .dial(&ctx, self.options.uri(), self.options.headers())
                .map_err(wrap_dial_error)?;
            let stream = WsStream::new(conn, self.options.message_kind())
                .with_close_timeout(self.options.close_timeout());
            return Ok(ClientStream::Direct(stream));
        }

        Ok(ClientStream::Early(self.connect_early(ctx)))
    }

    /// Open a stream that dials on first write, regardless of the early
    /// data limit.
    pub fn connect_early(&self, ctx: CancellationToken) -> EarlyStream<D> {
        EarlyStream::new(Arc::clone(&self.dialer), Arc::clone(&self.options), ctx)
    }
}

impl<D: Dialer> Clone for WsClient<D> {
    fn clone(&self) -> Self {
        Self {
            dialer: Arc::clone(&self.dialer),
            options: Arc::clone(&self.options),
        }
    }
}

/// A client byte stream, dialed either eagerly or on first write.
pub enum ClientStream<D: Dialer> {
    Direct(WsStream<D::Conn>),
    Early(EarlyStream<D>),
}

impl<D: Dialer> ClientStream<D> {
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ClientStream::Direct(stream) => stream.recv(buf),
            ClientStream::Early(stream) => stream.recv(buf),
        }
    }

    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        match self {
            ClientStream::Direct(stream) => stream.send(data),
            ClientStream::Early(stream) => stream.send(data),
        }
    }

    pub fn send_buffer(&self, buf: FrameBuf) -> io::Result<()> {
        match self {
            ClientStream::Direct(stream) => stream.send_buffer(buf),
            ClientStream::Early(stream) => stream.send_buffer(buf),
        }
    }

    pub fn close(&self) -> io::Result<()> {
        match self {
            ClientStream::Direct(stream) => stream.close(),
            ClientStream::Early(stream) => stream.close(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            ClientStream::Direct(stream) => stream.local_addr(),
            ClientStream::Early(stream) => stream.local_addr(),
        }
    }

    pub fn remote_addr(&self) -> io::Result<SocketAddr> {
        match self {
            ClientStream::Direct(stream) => stream.remote_addr(),
            ClientStream::Early(stream) => stream.remote_addr(),
        }
    }

    pub fn set_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        match self {
            ClientStream::Direct(stream) => stream.set_deadline(deadline),
            ClientStream::Early(stream) => stream.set_deadline(deadline),
        }
    }

    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        match self {
            ClientStream::Direct(stream) => stream.set_read_deadline(deadline),
            ClientStream::Early(stream) => stream.set_read_deadline(deadline),
        }
    }

    pub fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        match self {
            ClientStream::Direct(stream) => stream.set_write_deadline(deadline),
            ClientStream::Early(stream) => stream.set_write_deadline(deadline),
        }
    }

    pub fn front_headroom(&self) -> usize {
        match self {
            ClientStream::Direct(stream) => stream.front_headroom(),
            ClientStream::Early(stream) => stream.front_headroom(),
        }
    }

    /// Whether this stream defers its dial to the first write.
    pub fn is_early(&self) -> bool {
        matches!(self, ClientStream::Early(_))
    }
}

impl<D: Dialer> std::fmt::Debug for ClientStream<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientStream::Direct(stream) => f.debug_tuple("Direct").field(stream).finish(),
            ClientStream::Early(stream) => f.debug_tuple("Early").field(stream).finish(),
        }
    }
}

impl<D: Dialer> Read for ClientStream<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<D: Dialer> Read for &ClientStream<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<D: Dialer> Write for ClientStream<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: Dialer> Write for &ClientStream<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use wsstream_transport::memory::MemoryDialer;

    use super::*;
    use crate::error::ClientError;

    const URI: &str = "ws://example.com/ws";

    #[test]
    fn zero_early_data_dials_immediately() {
        let dialer = Arc::new(MemoryDialer::new());
        let client =
            WsClient::with_shared_dialer(Arc::clone(&dialer), &ClientConfig::new(URI)).unwrap();

        let stream = client.connect(CancellationToken::new()).unwrap();
        assert!(!stream.is_early());
        assert_eq!(dialer.dial_count(), 1);
        assert!(stream.local_addr().is_ok());

        let server = WsStream::server(dialer.accept().unwrap().conn, None);
        stream.send(b"direct").unwrap();
        let mut buf = [0u8; 6];
        (&server).read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"direct");
    }

    #[test]
    fn early_data_defers_dial() {
        let dialer = Arc::new(MemoryDialer::new());
        let config = ClientConfig::new(URI).with_max_early_data(64);
        let client = WsClient::with_shared_dialer(Arc::clone(&dialer), &config).unwrap();

        let stream = client.connect(CancellationToken::new()).unwrap();
        assert!(stream.is_early());
        assert_eq!(dialer.dial_count(), 0);

        stream.send(b"hi").unwrap();
        assert_eq!(dialer.dial_count(), 1);
        assert_eq!(dialer.requests()[0].uri, format!("{URI}aGk"));
    }

    #[test]
    fn direct_dial_failure_reports_status() {
        let dialer = MemoryDialer::new();
        dialer.reject_with(StatusCode::UNAUTHORIZED, "no token");
        let client = WsClient::new(dialer, &ClientConfig::new(URI)).unwrap();

        let err = client.connect(CancellationToken::new()).unwrap_err();
        let ClientError::Dial { status, body, .. } = err else {
            panic!("expected dial error");
        };
        assert_eq!(status, Some(StatusCode::UNAUTHORIZED));
        assert_eq!(body.as_deref(), Some("no token"));
    }

    #[test]
    fn configured_headers_are_sent() {
        let config = ClientConfig::new(URI).with_header("Authorization", "Bearer abc");
        let client = WsClient::new(MemoryDialer::new(), &config).unwrap();
        let _stream = client.connect(CancellationToken::new()).unwrap();

        let request = &client.dialer().requests()[0];
        assert_eq!(request.headers["authorization"], "Bearer abc");
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let err = WsClient::new(MemoryDialer::new(), &ClientConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn streams_from_one_client_dial_independently() {
        let dialer = Arc::new(MemoryDialer::new());
        let config = ClientConfig::new(URI).with_max_early_data(8);
        let client = WsClient::with_shared_dialer(Arc::clone(&dialer), &config).unwrap();

        let first = client.connect(CancellationToken::new()).unwrap();
        let second = client.clone().connect(CancellationToken::new()).unwrap();
        first.send(b"a").unwrap();
        second.send(b"b").unwrap();
        assert_eq!(dialer.dial_count(), 2);
    }
}
