use axum::body::Body as AxumBody;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};

use crate::ports::transport::{ResponseWriter, TransportError, TransportResult};

/// Status, headers and body captured by a [`BufferedResponseWriter`].
#[derive(Debug, Clone)]
pub struct WrittenResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Whether anything was committed at all
    pub committed: bool,
}

/// In-memory `ResponseWriter` that is turned into an axum response once the
/// router returns.
#[derive(Debug, Default)]
pub struct BufferedResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Nothing written is reported as an empty `200 OK`.
    pub fn into_written(self) -> WrittenResponse {
        WrittenResponse {
            status: self.status.unwrap_or(StatusCode::OK),
            headers: self.headers,
            body: self.body.freeze(),
            committed: self.status.is_some(),
        }
    }

    pub fn into_response(self) -> Response<AxumBody> {
        let written = self.into_written();
        let mut response = Response::new(AxumBody::from(written.body));
        *response.status_mut() = written.status;
        *response.headers_mut() = written.headers;
        response
    }
}

impl ResponseWriter for BufferedResponseWriter {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.status.is_some() {
            tracing::debug!(header = %name, "Ignoring header set after headers were sent");
            return;
        }
        self.headers.insert(name, value);
    }

    fn clear_headers(&mut self) {
        if self.status.is_none() {
            self.headers.clear();
        }
    }

    fn write_headers(&mut self, status: StatusCode) -> TransportResult<()> {
        if let Some(sent) = self.status {
            return Err(TransportError::HeadersAlreadySent(sent));
        }
        self.status = Some(status);
        Ok(())
    }

    fn write(&mut self, body: &[u8]) -> TransportResult<()> {
        if self.status.is_none() {
            self.write_headers(StatusCode::OK)?;
        }
        self.body.extend_from_slice(body);
        Ok(())
    }

    fn headers_sent(&self) -> bool {
        self.status.is_some()
    }
}
