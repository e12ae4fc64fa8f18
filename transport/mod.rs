// Transport module: backends a connection can be built on
pub mod managed;
pub mod stream;
pub mod tcp;
pub mod traits;
pub mod udp;
pub mod unix;

pub use managed::{ManagedBackend, ManagedConnector, ManagedListener, SessionEvent};
pub use stream::{StreamBackend, StreamSocket};
pub use tcp::*;
pub use traits::*;
pub use udp::*;
pub use unix::*;
