pub mod transport;

pub use transport::{ResponseWriter, TransportError, TransportResult};
