// setup.rs - connection pairs for each backend under test
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use transmission::{managed_pair, Connection, ConnectionConfig, ConnectionKind, Listener};

/// Large enough that a loopback burst rarely overflows the socket.
const SOCKET_BUFFER: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchBackend {
    Tcp,
    Udp,
    Managed,
}

impl BenchBackend {
    pub const ALL: [BenchBackend; 3] = [BenchBackend::Tcp, BenchBackend::Udp, BenchBackend::Managed];

    /// Datagrams may be dropped under load; readers must not wait forever.
    pub fn is_lossy(self) -> bool {
        self == BenchBackend::Udp
    }
}

impl fmt::Display for BenchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchBackend::Tcp => write!(f, "tcp"),
            BenchBackend::Udp => write!(f, "udp"),
            BenchBackend::Managed => write!(f, "managed"),
        }
    }
}

pub fn bench_config(backend: BenchBackend) -> ConnectionConfig {
    let timeout = if backend.is_lossy() {
        Duration::from_millis(500)
    } else {
        Duration::from_secs(10)
    };
    ConnectionConfig::new()
        .with_read_timeout(timeout)
        .with_receive_chunk(64 * 1024)
        .with_label("bench")
}

/// (sender, receiver) over loopback or in-process.
pub fn connection_pair(backend: BenchBackend) -> Result<(Connection, Connection)> {
    let config = bench_config(backend);
    match backend {
        BenchBackend::Managed => managed_pair(config).context("creating managed pair"),
        BenchBackend::Tcp | BenchBackend::Udp => {
            let kind = if backend == BenchBackend::Tcp {
                ConnectionKind::Tcp
            } else {
                ConnectionKind::Udp
            };
            let config = config.with_socket_buffer_size(SOCKET_BUFFER);
            let listener = Listener::bind_with("127.0.0.1:0", kind, config.clone())
                .with_context(|| format!("binding {} listener", backend))?;
            let port = listener
                .local_addr()
                .context("listener has no local address")?
                .port();

            let sender = Connection::connect_with("127.0.0.1", port, kind, config)
                .with_context(|| format!("connecting {} sender", backend))?;
            let receiver = listener.accept().context("accepting receiver")?;
            Ok((sender, receiver))
        }
    }
}
