// TCP transport implementation
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};
use transmission_core::{BackendKind, Result};

use crate::stream::{accept_until_closed, shutdown_listener, StreamBackend, StreamSocket};
use crate::traits::{Backend, BackendListener};

pub type TcpBackend = StreamBackend<TcpStream>;

impl StreamSocket for TcpStream {
    fn read_some(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream = self;
        stream.read(buf)
    }

    fn write_all_bytes(&self, data: &[u8]) -> io::Result<()> {
        let mut stream = self;
        stream.write_all(data)?;
        stream.flush()
    }

    fn set_receive_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }

    fn shutdown_both(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }

    fn peer_socket_addr(&self) -> Option<SocketAddr> {
        self.peer_addr().ok()
    }
}

impl StreamBackend<TcpStream> {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        debug!(fd = stream.as_raw_fd(), peer = ?stream.peer_addr().ok(), "tcp connected");
        Ok(StreamBackend::new(stream))
    }
}

pub struct TcpBackendListener {
    listener: TcpListener,
    closed: AtomicBool,
}

impl TcpBackendListener {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        info!(addr = ?listener.local_addr().ok(), "tcp listener bound");
        Ok(TcpBackendListener {
            listener,
            closed: AtomicBool::new(false),
        })
    }
}

impl BackendListener for TcpBackendListener {
    fn kind(&self) -> BackendKind {
        BackendKind::Stream
    }

    fn accept(&self) -> Result<Box<dyn Backend>> {
        let (stream, peer) = accept_until_closed(&self.closed, || self.listener.accept())?;
        debug!(fd = stream.as_raw_fd(), %peer, "tcp connection accepted");
        Ok(Box::new(TcpBackend::new(stream)))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    fn native_handle(&self) -> i64 {
        self.listener.as_raw_fd() as i64
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        shutdown_listener(self.listener.as_raw_fd())
    }
}
