// Buffer module: byte accumulation between the network and the application
pub mod accumulation;

pub use accumulation::AccumulationBuffer;
