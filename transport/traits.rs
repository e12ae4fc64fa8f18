// Backend abstraction - one capability interface over stream, datagram and managed transports
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use transmission_core::{BackendKind, Result};

/// One raw delivery from a backend.
///
/// `data` may be shorter than requested. An empty delivery with
/// `peer_closed` set means the remote side is gone.
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    pub data: Bytes,
    pub peer_closed: bool,
}

impl Delivery {
    pub fn data(data: Bytes) -> Self {
        Delivery {
            data,
            peer_closed: false,
        }
    }

    pub fn closed() -> Self {
        Delivery {
            data: Bytes::new(),
            peer_closed: true,
        }
    }
}

/// Raw, possibly-partial transport operations a connection is built on.
///
/// Methods take `&self` so the read path and the write path of a connection
/// can use the backend at the same time; each path is serialized by the
/// connection itself.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Block for one delivery of at most `max_bytes`.
    ///
    /// Stream backends honour the cap. Datagram and managed backends deliver
    /// whole messages and may exceed it; the caller buffers the surplus.
    fn receive(&self, max_bytes: usize) -> Result<Delivery>;

    /// Send the whole of `data` as one logical write.
    fn send(&self, data: &[u8]) -> Result<usize>;

    /// True once the peer has been seen closing the stream.
    fn remote_closed(&self) -> bool;

    fn native_handle(&self) -> i64;

    /// Deadline for a single `receive`; `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// SO_SNDBUF / SO_RCVBUF for socket backends.
    fn set_socket_buffer_size(&self, _size: usize) -> io::Result<()> {
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Close the transport, waking any receive blocked on it.
    fn close(&self) -> io::Result<()>;
}

/// Produces one backend per incoming peer.
pub trait BackendListener: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn accept(&self) -> Result<Box<dyn Backend>>;

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn native_handle(&self) -> i64;

    /// Stop accepting; a blocked or later `accept` fails with `Closed`.
    fn close(&self) -> io::Result<()>;
}
