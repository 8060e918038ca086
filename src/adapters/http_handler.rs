use std::{sync::Arc, time::Instant};

use axum::body::Body as AxumBody;
use http::{HeaderValue, StatusCode, header};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{Request, Response};
use tracing::{Instrument, Span};

use crate::{
    adapters::BufferedResponseWriter,
    core::{DispatchOutcome, Router},
    tracing_setup::create_request_span,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Bridges axum requests onto a shared [`Router`].
///
/// The request body is collected (up to `max_body_bytes`) before dispatch so
/// handlers see a complete body. Handlers are synchronous and run on the
/// blocking pool.
pub struct HttpHandler {
    router: Arc<Router>,
    max_body_bytes: usize,
}

impl HttpHandler {
    pub fn new(router: Arc<Router>, max_body_bytes: usize) -> Self {
        Self {
            router,
            max_body_bytes,
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Main request handler: collect the body, dispatch, and return whatever
    /// the router wrote.
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = create_request_span(req.method().as_str(), req.uri().path(), &request_id);

        async move {
            let start = Instant::now();
            let mut response = self.route(req).await;

            let current = Span::current();
            current.record("http.status_code", response.status().as_u16());
            current.record("duration_ms", start.elapsed().as_millis() as u64);
            tracing::info!(status = response.status().as_u16(), "Request completed");

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            response
        }
        .instrument(span)
        .await
    }

    async fn route(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let (parts, body) = req.into_parts();
        let body = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                tracing::warn!(limit = self.max_body_bytes, "Request body exceeds limit");
                return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return plain_response(StatusCode::BAD_REQUEST, "Bad Request");
            }
        };
        let request = crate::core::Request::from_http(Request::from_parts(parts, body));

        let router = self.router.clone();
        let span = Span::current();
        let dispatched = tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                let mut writer = BufferedResponseWriter::new();
                let outcome = router.dispatch(request, &mut writer);
                (outcome, writer)
            })
        })
        .await;

        match dispatched {
            Ok((outcome, writer)) => match outcome {
                DispatchOutcome::Faulted { reported: false } if writer.status().is_none() => {
                    tracing::error!("Handler fault produced no response; sending bare 500");
                    plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                }
                DispatchOutcome::Faulted { reported: false } => {
                    tracing::warn!("Handler fault left the original response in place");
                    writer.into_response()
                }
                _ => writer.into_response(),
            },
            Err(e) => {
                tracing::error!(error = %e, "Dispatch task failed");
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

impl Clone for HttpHandler {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<AxumBody> {
    let mut response = Response::new(AxumBody::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

#[cfg(test)]
mod tests {
    use eyre::eyre;

    use super::*;
    use crate::core::FaultReport;

    fn create_test_handler(max_body_bytes: usize) -> HttpHandler {
        let mut builder = Router::builder();
        builder
            .get("/hello/:name", |req, res| {
                res.content_type("text/plain");
                res.ok(format!("hello {}", req.param("name").unwrap_or_default()))?;
                Ok(())
            })
            .unwrap()
            .post("/echo", |req, res| {
                res.ok(req.body())?;
                Ok(())
            })
            .unwrap()
            .get("/fail", |_, _| Err(eyre!("boom")))
            .unwrap();
        HttpHandler::new(Arc::new(builder.build()), max_body_bytes)
    }

    async fn body_bytes(response: Response<AxumBody>) -> bytes::Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_dispatches_to_router() {
        let handler = create_test_handler(1024);
        let req = Request::get("/hello/ada").body(AxumBody::empty()).unwrap();

        let response = handler.handle_request(req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(body_bytes(response).await, "hello ada");
    }

    #[tokio::test]
    async fn test_body_is_forwarded() {
        let handler = create_test_handler(1024);
        let req = Request::post("/echo").body(AxumBody::from("ping")).unwrap();

        let response = handler.handle_request(req).await;
        assert_eq!(body_bytes(response).await, "ping");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let handler = create_test_handler(4);
        let req = Request::post("/echo")
            .body(AxumBody::from("way too long"))
            .unwrap();

        let response = handler.handle_request(req).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_not_found() {
        let handler = create_test_handler(1024);
        let req = Request::get("/missing").body(AxumBody::empty()).unwrap();

        let response = handler.handle_request(req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_fault_report() {
        let handler = create_test_handler(1024);
        let req = Request::get("/fail").body(AxumBody::empty()).unwrap();

        let response = handler.handle_request(req).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let report: FaultReport = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(report.value, "boom");
        assert!(report.data.is_null());
    }
}
