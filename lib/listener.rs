// Listener: produces one Connection per accepted peer
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};
use transmission_core::{BackendKind, ConnectionKind, Result, TransmissionError};
use transmission_transport::managed;
use transmission_transport::{
    BackendListener, ManagedConnector, TcpBackendListener, UdpBackendListener, UnixBackendListener,
};

use crate::config::ConnectionConfig;
use crate::connection::Connection;

/// Accepts peers and wraps each one in a `Connection` built with the
/// listener's configuration.
///
/// A datagram listener has no per-peer accept: its first `accept` yields the
/// single server-side connection and later calls fail.
pub struct Listener {
    inner: Box<dyn BackendListener>,
    config: ConnectionConfig,
    closed: AtomicBool,
}

impl Listener {
    /// Listen on `port` on every interface.
    pub fn bind(port: u16, kind: ConnectionKind) -> Result<Self> {
        Self::bind_with(("0.0.0.0", port), kind, ConnectionConfig::global().clone())
    }

    pub fn bind_with<A: ToSocketAddrs>(
        addr: A,
        kind: ConnectionKind,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let inner: Box<dyn BackendListener> = match kind {
            ConnectionKind::Tcp => Box::new(TcpBackendListener::bind(addr)?),
            ConnectionKind::Udp => Box::new(UdpBackendListener::bind(addr)?),
        };
        Ok(Self::from_backend_listener(inner, config))
    }

    pub fn bind_unix<P: AsRef<Path>>(path: P, config: ConnectionConfig) -> Result<Self> {
        let inner = UnixBackendListener::bind(path)?;
        Ok(Self::from_backend_listener(Box::new(inner), config))
    }

    /// An in-process listener and the connector that opens sessions to it.
    pub fn managed(config: ConnectionConfig) -> (Self, ManagedConnector) {
        let (inner, connector) = managed::listener();
        (Self::from_backend_listener(Box::new(inner), config), connector)
    }

    pub fn from_backend_listener(inner: Box<dyn BackendListener>, config: ConnectionConfig) -> Self {
        Listener {
            inner,
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Block until a peer arrives. Fails with `Closed` once the listener is
    /// closed, including when the close happens during the wait.
    pub fn accept(&self) -> Result<Connection> {
        if self.is_closed() {
            return Err(TransmissionError::Closed);
        }

        let backend = match self.inner.accept() {
            Ok(backend) => backend,
            Err(_) if self.is_closed() => return Err(TransmissionError::Closed),
            Err(e) => {
                if !matches!(e, TransmissionError::InvalidArgument(_)) {
                    warn!(listener = self.inner.native_handle(), error = %e, "accept failed");
                }
                return Err(e);
            }
        };

        let connection = Connection::new(backend, self.config.clone())?;
        info!(
            listener = self.inner.native_handle(),
            connection = connection.identifier(),
            peer = ?connection.peer_addr(),
            "connection accepted"
        );
        Ok(connection)
    }

    pub fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting. Connections already accepted are unaffected.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!(listener = self.inner.native_handle(), "closing listener");
        self.inner.close()?;
        Ok(())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
