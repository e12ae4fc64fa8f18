// Stream backend shared by TCP and Unix-domain sockets
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use nix::errno::Errno;
use nix::sys::socket::{setsockopt, shutdown, sockopt, Shutdown};
use tracing::{debug, trace};
use transmission_core::{BackendKind, Result, TransmissionError};

use crate::traits::{Backend, Delivery};

/// A connected, reliable byte-stream socket.
pub trait StreamSocket: AsFd + AsRawFd + Send + Sync + 'static {
    fn read_some(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all_bytes(&self, data: &[u8]) -> io::Result<()>;
    fn set_receive_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
    fn shutdown_both(&self) -> io::Result<()>;

    fn peer_socket_addr(&self) -> Option<SocketAddr> {
        None
    }
}

pub struct StreamBackend<S> {
    socket: S,
    remote_closed: AtomicBool,
    closed: AtomicBool,
}

impl<S: StreamSocket> StreamBackend<S> {
    pub fn new(socket: S) -> Self {
        StreamBackend {
            socket,
            remote_closed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }
}

impl<S: StreamSocket> Backend for StreamBackend<S> {
    fn kind(&self) -> BackendKind {
        BackendKind::Stream
    }

    fn receive(&self, max_bytes: usize) -> Result<Delivery> {
        if max_bytes == 0 {
            return Err(TransmissionError::InvalidArgument(
                "stream receive of zero bytes".to_string(),
            ));
        }

        let mut buf = vec![0u8; max_bytes];
        loop {
            match self.socket.read_some(&mut buf) {
                // A stream read of zero bytes is end-of-stream.
                Ok(0) => {
                    self.remote_closed.store(true, Ordering::Release);
                    trace!(fd = self.socket.as_raw_fd(), "stream peer closed");
                    return Ok(Delivery::closed());
                }
                Ok(n) => {
                    buf.truncate(n);
                    trace!(fd = self.socket.as_raw_fd(), bytes = n, "stream receive");
                    return Ok(Delivery::data(Bytes::from(buf)));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        // write_all loops over partial sends; any error fails the whole write
        self.socket.write_all_bytes(data)?;
        trace!(fd = self.socket.as_raw_fd(), bytes = data.len(), "stream send");
        Ok(data.len())
    }

    fn remote_closed(&self) -> bool {
        self.remote_closed.load(Ordering::Acquire)
    }

    fn native_handle(&self) -> i64 {
        self.socket.as_raw_fd() as i64
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_receive_timeout(timeout)
    }

    fn set_socket_buffer_size(&self, size: usize) -> io::Result<()> {
        setsockopt(&self.socket, sockopt::SndBuf, &size)?;
        setsockopt(&self.socket, sockopt::RcvBuf, &size)?;
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.socket.peer_socket_addr()
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(fd = self.socket.as_raw_fd(), "closing stream backend");
        match self.socket.shutdown_both() {
            Err(e) if e.kind() != ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

// Accept loop shared by the stream listeners. Transient failures are retried.
pub(crate) fn accept_until_closed<T>(
    closed: &AtomicBool,
    mut accept: impl FnMut() -> io::Result<T>,
) -> Result<T> {
    loop {
        if closed.load(Ordering::Acquire) {
            return Err(TransmissionError::Closed);
        }
        match accept() {
            Ok(accepted) => return Ok(accepted),
            Err(_) if closed.load(Ordering::Acquire) => return Err(TransmissionError::Closed),
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::ConnectionAborted) => {
                debug!(error = %e, "transient accept failure, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// Shutting down a listening socket wakes a thread blocked in accept().
pub(crate) fn shutdown_listener(fd: RawFd) -> io::Result<()> {
    match shutdown(fd, Shutdown::Both) {
        Ok(()) | Err(Errno::ENOTCONN) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
