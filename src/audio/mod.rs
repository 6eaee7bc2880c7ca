pub mod device;
pub mod transport;

pub use transport::{AudioTransport, CycleTimer};
