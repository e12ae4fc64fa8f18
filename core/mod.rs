// Core module: framing definitions, shared types and errors (NO I/O)
pub mod error;
pub mod protocol;
pub mod types;

pub use error::*;
pub use protocol::*;
pub use types::*;
