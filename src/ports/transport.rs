use http::{HeaderName, HeaderValue, StatusCode};
use thiserror::Error;

/// Error type for response writer operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// `write_headers` was called after the status line was already committed
    #[error("Headers already sent with status {0}")]
    HeadersAlreadySent(StatusCode),

    /// The underlying connection refused the write
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// ResponseWriter defines the port (interface) the router writes responses through.
///
/// There is no buffering contract at this layer: once `write_headers` succeeds the
/// status and headers are committed, and a second call must fail.
pub trait ResponseWriter: Send {
    /// Set (replace) a header that will be sent with `write_headers`
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Drop every header set since the last commit; no effect once headers are sent
    fn clear_headers(&mut self);

    /// Commit the status code and headers
    ///
    /// # Returns
    /// `TransportError::HeadersAlreadySent` if headers were committed before
    fn write_headers(&mut self, status: StatusCode) -> TransportResult<()>;

    /// Append bytes to the response body
    ///
    /// Writing before `write_headers` implicitly commits a `200 OK`.
    fn write(&mut self, body: &[u8]) -> TransportResult<()>;

    /// Whether the status line and headers have been committed
    fn headers_sent(&self) -> bool;
}
