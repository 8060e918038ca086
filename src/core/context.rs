//! Request and response facades handed to route handlers.
//!
//! `Request` is an owned snapshot of the transport request plus the parameter
//! bindings collected while walking the trie. `Response` borrows the
//! transport's [`ResponseWriter`] for the duration of one handler call and
//! offers the small set of helpers handlers are expected to use.
use std::collections::HashMap;

use bytes::Bytes;
use eyre::{Result, WrapErr};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};

use crate::ports::transport::{ResponseWriter, TransportResult};

/// Parameter bindings keyed by the capture segment, colon included (`":id"`).
pub type Params = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct Request {
    method: http::Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    params: Params,
}

impl Request {
    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: Params::new(),
        }
    }

    /// Build from a transport request whose body has already been collected.
    /// The query string is not part of the routed path.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            body,
            params: Params::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &http::Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body).wrap_err("Request body is not valid UTF-8")
    }

    /// Body deserialized from JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).wrap_err("Failed to parse request body as JSON")
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Look up a captured segment. `"id"` and `":id"` are equivalent.
    pub fn param(&self, name: &str) -> Option<&str> {
        let value = if name.starts_with(':') {
            self.params.get(name)
        } else {
            self.params.get(&format!(":{name}"))
        };
        value.map(String::as_str)
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }
}

/// Response side of a handler call.
pub struct Response<'w> {
    writer: &'w mut dyn ResponseWriter,
}

impl<'w> Response<'w> {
    pub fn new(writer: &'w mut dyn ResponseWriter) -> Self {
        Self { writer }
    }

    pub fn header(&mut self, name: HeaderName, value: HeaderValue) {
        self.writer.set_header(name, value);
    }

    pub fn content_type(&mut self, content_type: &'static str) {
        self.header(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    /// `200 OK` with the given body.
    pub fn ok(&mut self, body: impl AsRef<[u8]>) -> TransportResult<()> {
        self.respond(StatusCode::OK, body)
    }

    /// Set `Content-Length`, commit headers with `status`, then write the body.
    pub fn respond(&mut self, status: StatusCode, body: impl AsRef<[u8]>) -> TransportResult<()> {
        let body = body.as_ref();
        self.header(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.writer.write_headers(status)?;
        self.writer.write(body)
    }

    /// Serialize `value` and respond with `application/json`.
    pub fn json<T: Serialize>(&mut self, status: StatusCode, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value).wrap_err("Failed to serialize response body")?;
        self.content_type("application/json");
        self.respond(status, body)?;
        Ok(())
    }

    /// Forget headers set so far. Committed headers are not affected.
    pub fn clear_headers(&mut self) {
        self.writer.clear_headers();
    }

    pub fn headers_sent(&self) -> bool {
        self.writer.headers_sent()
    }

    /// Raw writer access for handlers that stream the body in pieces.
    pub fn writer(&mut self) -> &mut dyn ResponseWriter {
        &mut *self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::BufferedResponseWriter;

    #[test]
    fn test_param_lookup_accepts_both_forms() {
        let mut req = Request::new(http::Method::GET, "/blog/42");
        req.set_params(Params::from([(":id".to_string(), "42".to_string())]));

        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.param(":id"), Some("42"));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn test_from_http_drops_query() {
        let http_req = http::Request::builder()
            .method(http::Method::POST)
            .uri("/search?q=rust")
            .body(Bytes::from_static(br#"{"limit":3}"#))
            .unwrap();
        let req = Request::from_http(http_req);

        assert_eq!(req.path(), "/search");
        assert_eq!(*req.method(), http::Method::POST);
        let body: serde_json::Value = req.json().unwrap();
        assert_eq!(body["limit"], 3);
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let req = Request::new(http::Method::POST, "/").with_body(vec![0xff, 0xfe]);
        assert!(req.text().is_err());
    }

    #[test]
    fn test_respond_sets_content_length() {
        let mut writer = BufferedResponseWriter::new();
        let mut res = Response::new(&mut writer);
        res.content_type("text/plain");
        res.respond(StatusCode::CREATED, "hello").unwrap();
        assert!(res.headers_sent());

        let response = writer.into_written();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers[header::CONTENT_LENGTH], "5");
        assert_eq!(response.headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(&response.body[..], b"hello");
    }

    #[test]
    fn test_second_respond_is_rejected_by_writer() {
        let mut writer = BufferedResponseWriter::new();
        let mut res = Response::new(&mut writer);
        res.ok("first").unwrap();
        assert!(res.respond(StatusCode::INTERNAL_SERVER_ERROR, "second").is_err());

        let response = writer.into_written();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"first");
    }
}
