pub mod buffered_writer;
pub mod http_handler;
pub mod server;

/// Re-export commonly used types from adapters
pub use buffered_writer::{BufferedResponseWriter, WrittenResponse};
pub use http_handler::HttpHandler;
pub use server::{app, serve};
