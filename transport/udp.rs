// UDP transport implementation
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nix::sys::socket::{setsockopt, shutdown, sockopt, Shutdown};
use once_cell::sync::OnceCell;
use tracing::{debug, info, trace};
use transmission_core::{BackendKind, Result, TransmissionError};

use crate::traits::{Backend, BackendListener, Delivery};

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM: usize = 65_535;

/// Datagram backend with a set-once outgoing address.
///
/// Clients know the peer from `connect`. A server-bound backend learns it
/// from the first datagram it receives; later datagrams from other senders
/// never move it.
pub struct UdpBackend {
    socket: Arc<UdpSocket>,
    outgoing: OnceCell<SocketAddr>,
    incoming_port: Option<u16>,
    closed: AtomicBool,
}

impl UdpBackend {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let peer = addr.to_socket_addrs()?.next().ok_or_else(|| {
            TransmissionError::Io(io::Error::new(
                ErrorKind::InvalidInput,
                "address resolved to nothing",
            ))
        })?;
        let local = if peer.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local)?;
        debug!(fd = socket.as_raw_fd(), %peer, "udp client socket ready");
        Ok(UdpBackend {
            socket: Arc::new(socket),
            outgoing: OnceCell::with_value(peer),
            incoming_port: None,
            closed: AtomicBool::new(false),
        })
    }

    /// Server side: share the listener's socket and learn the peer on receive.
    pub fn bound(socket: Arc<UdpSocket>, port: u16) -> Self {
        UdpBackend {
            socket,
            outgoing: OnceCell::new(),
            incoming_port: Some(port),
            closed: AtomicBool::new(false),
        }
    }

    pub fn outgoing_address(&self) -> Option<SocketAddr> {
        self.outgoing.get().copied()
    }

    pub fn incoming_port(&self) -> Option<u16> {
        self.incoming_port
    }
}

impl Backend for UdpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Datagram
    }

    // Always reads a whole datagram; `max_bytes` only bounds what the
    // caller consumes, never what the socket delivers.
    fn receive(&self, _max_bytes: usize) -> Result<Delivery> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    if self.closed.load(Ordering::Acquire) {
                        return Ok(Delivery::closed());
                    }
                    if self.outgoing.set(from).is_ok() {
                        debug!(fd = self.socket.as_raw_fd(), peer = %from, "learned outgoing address");
                    }
                    buf.truncate(n);
                    trace!(fd = self.socket.as_raw_fd(), bytes = n, %from, "datagram receive");
                    return Ok(Delivery::data(Bytes::from(buf)));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        let peer = self
            .outgoing
            .get()
            .copied()
            .ok_or(TransmissionError::NotConnected)?;

        let sent = self.socket.send_to(data, peer)?;
        if sent < data.len() {
            return Err(TransmissionError::Io(io::Error::new(
                ErrorKind::WriteZero,
                format!("short datagram send: {} of {} bytes", sent, data.len()),
            )));
        }
        trace!(fd = self.socket.as_raw_fd(), bytes = sent, %peer, "datagram send");
        Ok(sent)
    }

    fn remote_closed(&self) -> bool {
        false
    }

    fn native_handle(&self) -> i64 {
        self.socket.as_raw_fd() as i64
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    fn set_socket_buffer_size(&self, size: usize) -> io::Result<()> {
        setsockopt(&*self.socket, sockopt::SndBuf, &size)?;
        setsockopt(&*self.socket, sockopt::RcvBuf, &size)?;
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.outgoing_address()
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(fd = self.socket.as_raw_fd(), "closing datagram backend");
        // Linux wakes a blocked recv_from even on an unconnected socket,
        // although it still reports ENOTCONN.
        let _ = shutdown(self.socket.as_raw_fd(), Shutdown::Read);
        Ok(())
    }
}

/// Datagram "listener": datagram sockets have no per-peer accept, so the
/// bound socket is handed out once, wrapped in a server-bound backend.
pub struct UdpBackendListener {
    socket: Arc<UdpSocket>,
    port: u16,
    handed_out: AtomicBool,
    closed: AtomicBool,
}

impl UdpBackendListener {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let port = socket.local_addr()?.port();
        info!(port, "udp listener bound");
        Ok(UdpBackendListener {
            socket: Arc::new(socket),
            port,
            handed_out: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }
}

impl BackendListener for UdpBackendListener {
    fn kind(&self) -> BackendKind {
        BackendKind::Datagram
    }

    fn accept(&self) -> Result<Box<dyn Backend>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransmissionError::Closed);
        }
        if self.handed_out.swap(true, Ordering::AcqRel) {
            return Err(TransmissionError::InvalidArgument(
                "datagram listener hands out a single connection".to_string(),
            ));
        }
        debug!(port = self.port, "udp listener produced its connection");
        Ok(Box::new(UdpBackend::bound(Arc::clone(&self.socket), self.port)))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    fn native_handle(&self) -> i64 {
        self.socket.as_raw_fd() as i64
    }

    // The socket stays open for the connection already handed out; it is
    // released when both are dropped.
    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
