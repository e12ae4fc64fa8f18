// Error taxonomy for connections, backends and listeners
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransmissionError {
    /// Zero-size read or a request the connection cannot satisfy.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Length prefix width outside {8, 16, 32, 64}.
    #[error("unsupported length prefix width: {0} bits")]
    InvalidFrame(u32),

    /// Peer closed the stream before the read could complete.
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Length does not fit the prefix width (or the platform's usize).
    #[error("length {len} does not fit in a {bits}-bit length prefix")]
    ValueTooLarge { len: u64, bits: u32 },

    /// Decoded frame length is above the configured maximum.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u64, max: u64 },

    /// Datagram write before an outgoing address is known.
    #[error("no outgoing address known for datagram backend")]
    NotConnected,

    /// Operation attempted after an explicit close.
    #[error("connection is closed")]
    Closed,
}

impl TransmissionError {
    /// True when the connection cannot be used after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransmissionError::ConnectionClosed | TransmissionError::Closed
        )
    }

    /// True when a receive deadline expired before any data arrived.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransmissionError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransmissionError>;
