// lib: message-framing connections over TCP, UDP, Unix and managed backends
//
// A Connection adds an accumulation buffer, exact and bounded reads,
// length-prefixed framing and separate read/write locks on top of a raw
// transport backend.

// Re-export core protocol and types
pub use transmission_core::*;

// Re-export transport abstractions
pub use transmission_transport::*;

pub use transmission_buffer::AccumulationBuffer;

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use listener::Listener;

/// Both ends of an in-process managed session, ready to use.
pub fn managed_pair(config: ConnectionConfig) -> Result<(Connection, Connection)> {
    let (a, b) = transmission_transport::managed::pair();
    Ok((
        Connection::new(Box::new(a), config.clone())?,
        Connection::new(Box::new(b), config)?,
    ))
}
