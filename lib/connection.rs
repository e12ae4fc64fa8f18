// Connection: buffered, framed, serialized access to one backend
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, debug_span, trace, warn, Span};
use transmission_buffer::AccumulationBuffer;
use transmission_core::protocol;
use transmission_core::{BackendKind, ConnectionKind, PrefixWidth, Result, TransmissionError};
use transmission_transport::{Backend, Delivery, TcpBackend, UdpBackend, UnixBackend};

use crate::config::ConnectionConfig;

// Upper bound on one stream receive, however large the shortfall.
const MAX_STREAM_RECEIVE: usize = 1 << 20;

/// A per-peer connection over any backend.
///
/// Reads are serialized by one lock and writes by another, so a read and a
/// write can run at the same time but two reads (or two writes) never
/// interleave. A length-prefixed read or write holds its lock for the whole
/// frame.
///
/// Reads block until satisfied, the peer closes, or the configured
/// `read_timeout` expires. With no timeout, a peer that goes silent blocks
/// the reading thread indefinitely.
pub struct Connection {
    id: i64,
    backend: Box<dyn Backend>,
    // The accumulation buffer doubles as the read lock.
    buffer: Mutex<AccumulationBuffer>,
    write_lock: Mutex<()>,
    closed: AtomicBool,
    peer_closed: AtomicBool,
    config: ConnectionConfig,
    span: Span,
}

impl Connection {
    pub fn new(backend: Box<dyn Backend>, config: ConnectionConfig) -> Result<Self> {
        if config.read_timeout.is_some() {
            backend.set_read_timeout(config.read_timeout)?;
        }
        if let Some(size) = config.socket_buffer_size {
            backend.set_socket_buffer_size(size)?;
        }

        let id = backend.native_handle();
        let span = debug_span!(
            "connection",
            id,
            kind = %backend.kind(),
            label = config.label.as_deref().unwrap_or_default(),
        );
        debug!(parent: &span, peer = ?backend.peer_addr(), "connection created");

        Ok(Connection {
            id,
            backend,
            buffer: Mutex::new(AccumulationBuffer::with_capacity(config.receive_chunk)),
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            peer_closed: AtomicBool::new(false),
            config,
            span,
        })
    }

    /// Wrap a backend using the environment-derived default configuration.
    pub fn from_backend<B: Backend + 'static>(backend: B) -> Result<Self> {
        Self::new(Box::new(backend), ConnectionConfig::global().clone())
    }

    pub fn connect(host: &str, port: u16, kind: ConnectionKind) -> Result<Self> {
        Self::connect_with(host, port, kind, ConnectionConfig::global().clone())
    }

    pub fn connect_with(
        host: &str,
        port: u16,
        kind: ConnectionKind,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let backend: Box<dyn Backend> = match kind {
            ConnectionKind::Tcp => Box::new(TcpBackend::connect((host, port))?),
            ConnectionKind::Udp => Box::new(UdpBackend::connect((host, port))?),
        };
        Self::new(backend, config)
    }

    pub fn connect_unix<P: AsRef<Path>>(path: P, config: ConnectionConfig) -> Result<Self> {
        Self::new(Box::new(UnixBackend::connect(path)?), config)
    }

    /// The stream socket passed in by a service manager (socket activation).
    pub fn inherited(config: ConnectionConfig) -> Result<Self> {
        Self::new(Box::new(UnixBackend::inherited()?), config)
    }

    /// Read exactly `size` bytes, blocking until they are available.
    ///
    /// Anything the backend delivers beyond `size` stays buffered for the
    /// next read.
    pub fn read_exact(&self, size: usize) -> Result<Bytes> {
        let _entered = self.span.enter();
        let mut buffer = self.buffer.lock();

        if size == 0 {
            return Err(TransmissionError::InvalidArgument(
                "read size must be at least one byte".to_string(),
            ));
        }
        self.ensure_open()?;

        self.fill(&mut buffer, size)?;
        take_exact(&mut buffer, size)
    }

    /// Read at most `max_size` bytes: whatever is buffered, or else the
    /// result of a single backend delivery.
    pub fn read_up_to(&self, max_size: usize) -> Result<Bytes> {
        let _entered = self.span.enter();
        let mut buffer = self.buffer.lock();

        if max_size == 0 {
            return Err(TransmissionError::InvalidArgument(
                "read size must be at least one byte".to_string(),
            ));
        }
        self.ensure_open()?;

        if !buffer.is_empty() {
            return Ok(buffer.read_up_to(max_size));
        }

        let delivery = self.receive(max_size.min(MAX_STREAM_RECEIVE))?;
        if delivery.data.is_empty() {
            if delivery.peer_closed {
                return Err(self.peer_gone());
            }
            return Err(TransmissionError::Io(io::Error::new(
                ErrorKind::UnexpectedEof,
                "backend delivered no data",
            )));
        }

        buffer.write(&delivery.data);
        Ok(buffer.read_up_to(max_size))
    }

    pub fn write(&self, data: &[u8]) -> Result<()> {
        let _entered = self.span.enter();
        let _guard = self.write_lock.lock();

        self.ensure_open()?;
        self.send(data)
    }

    pub fn write_str(&self, text: &str) -> Result<()> {
        self.write(text.as_bytes())
    }

    /// Read one frame: a big-endian length of `width`, then that many bytes.
    ///
    /// The length field is only consumed once the whole frame is buffered,
    /// so a frame interrupted by a read timeout can be read again.
    pub fn read_with_length_prefix(&self, width: PrefixWidth) -> Result<Bytes> {
        let _entered = self.span.enter();
        let mut buffer = self.buffer.lock();
        self.ensure_open()?;

        let field_len = width.bytes();
        self.fill(&mut buffer, field_len)?;

        let field = buffer.peek(field_len).ok_or_else(|| short_buffer(field_len))?;
        let declared = protocol::decode_length(field, width)?;
        let payload_len = protocol::checked_frame_len(declared, width, self.config.max_frame_len)?;
        let frame_len = field_len
            .checked_add(payload_len)
            .ok_or(TransmissionError::ValueTooLarge {
                len: declared,
                bits: width.bits(),
            })?;

        self.fill(&mut buffer, frame_len)?;
        take_exact(&mut buffer, field_len)?;
        let payload = take_exact(&mut buffer, payload_len)?;
        trace!(bytes = payload_len, prefix = %width, "frame received");
        Ok(payload)
    }

    /// Write one frame. Length field and payload go to the backend as a
    /// single write, so concurrent writers never split a frame.
    pub fn write_with_length_prefix(&self, data: &[u8], width: PrefixWidth) -> Result<()> {
        let _entered = self.span.enter();
        let _guard = self.write_lock.lock();
        self.ensure_open()?;

        let frame = protocol::encode_frame(data, width)?;
        self.send(&frame)
    }

    pub fn read_with_length_prefix_bits(&self, prefix_bits: u32) -> Result<Bytes> {
        self.read_with_length_prefix(PrefixWidth::try_from(prefix_bits)?)
    }

    pub fn write_with_length_prefix_bits(&self, data: &[u8], prefix_bits: u32) -> Result<()> {
        self.write_with_length_prefix(data, PrefixWidth::try_from(prefix_bits)?)
    }

    pub fn identifier(&self) -> i64 {
        self.id
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.backend.peer_addr()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Bytes received but not yet read. Waits for any in-flight read.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the backend. Every later read or write fails with `Closed`,
    /// and a read blocked in the backend is woken.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _entered = self.span.enter();
        debug!("closing connection");
        self.backend.close()?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransmissionError::Closed);
        }
        if self.peer_closed.load(Ordering::Acquire) {
            return Err(TransmissionError::ConnectionClosed);
        }
        Ok(())
    }

    // Pull from the backend until `size` bytes are buffered. Bytes received
    // before a failure stay buffered.
    fn fill(&self, buffer: &mut AccumulationBuffer, size: usize) -> Result<()> {
        while buffer.len() < size {
            let shortfall = size - buffer.len();
            let request = shortfall
                .min(MAX_STREAM_RECEIVE)
                .max(self.config.receive_chunk);

            let delivery = self.receive(request)?;
            buffer.write(&delivery.data);

            if delivery.peer_closed && buffer.len() < size {
                return Err(self.peer_gone());
            }
        }
        Ok(())
    }

    fn receive(&self, max_bytes: usize) -> Result<Delivery> {
        match self.backend.receive(max_bytes) {
            Ok(_) if self.is_closed() => Err(TransmissionError::Closed),
            Ok(delivery) => Ok(delivery),
            Err(_) if self.is_closed() => Err(TransmissionError::Closed),
            Err(e) => {
                if e.is_timeout() {
                    debug!(error = %e, "receive deadline expired");
                } else {
                    warn!(error = %e, "backend receive failed");
                }
                Err(e)
            }
        }
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        match self.backend.send(data) {
            Ok(sent) => {
                trace!(bytes = sent, "write complete");
                Ok(())
            }
            Err(_) if self.is_closed() => Err(TransmissionError::Closed),
            Err(e) => {
                warn!(error = %e, bytes = data.len(), "backend send failed");
                Err(e)
            }
        }
    }

    fn peer_gone(&self) -> TransmissionError {
        self.peer_closed.store(true, Ordering::Release);
        debug!("peer closed the connection");
        TransmissionError::ConnectionClosed
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("kind", &self.backend.kind())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn take_exact(buffer: &mut AccumulationBuffer, n: usize) -> Result<Bytes> {
    buffer.read_exact(n).ok_or_else(|| short_buffer(n))
}

fn short_buffer(n: usize) -> TransmissionError {
    TransmissionError::InvalidArgument(format!("buffer holds fewer than {} bytes", n))
}
