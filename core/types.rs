// Core types shared by every transmission component
use std::fmt;

use crate::error::TransmissionError;

/// Width of the big-endian length field in front of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum PrefixWidth {
    U8 = 8,
    U16 = 16,
    U32 = 32,
    U64 = 64,
}

impl PrefixWidth {
    pub const ALL: [PrefixWidth; 4] = [
        PrefixWidth::U8,
        PrefixWidth::U16,
        PrefixWidth::U32,
        PrefixWidth::U64,
    ];

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Number of bytes the length field occupies on the wire.
    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Largest payload length representable in this width.
    pub fn max_len(self) -> u64 {
        match self {
            PrefixWidth::U8 => u8::MAX as u64,
            PrefixWidth::U16 => u16::MAX as u64,
            PrefixWidth::U32 => u32::MAX as u64,
            PrefixWidth::U64 => u64::MAX,
        }
    }
}

impl TryFrom<u32> for PrefixWidth {
    type Error = TransmissionError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(PrefixWidth::U8),
            16 => Ok(PrefixWidth::U16),
            32 => Ok(PrefixWidth::U32),
            64 => Ok(PrefixWidth::U64),
            other => Err(TransmissionError::InvalidFrame(other)),
        }
    }
}

impl fmt::Display for PrefixWidth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

// Delivery model of the transport under a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Stream,
    Datagram,
    Managed,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BackendKind::Stream => write!(f, "stream"),
            BackendKind::Datagram => write!(f, "datagram"),
            BackendKind::Managed => write!(f, "managed"),
        }
    }
}

// IP protocol selected when connecting or listening by port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionKind {
    #[default]
    Tcp,
    Udp,
}

impl ConnectionKind {
    pub fn backend_kind(self) -> BackendKind {
        match self {
            ConnectionKind::Tcp => BackendKind::Stream,
            ConnectionKind::Udp => BackendKind::Datagram,
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionKind::Tcp => write!(f, "tcp"),
            ConnectionKind::Udp => write!(f, "udp"),
        }
    }
}
