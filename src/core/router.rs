//! Route registration and request dispatch.
//!
//! Routing is two-phase. A [`RouterBuilder`] collects routes, the diagnostic
//! callback and the logger; [`RouterBuilder::build`] freezes them into an
//! immutable [`Router`]. Only the builder can mutate the route table, so a
//! built router is safe to share across any number of in-flight requests
//! (`Arc<Router>`), and no route can be added while requests are being served.
use std::{collections::HashMap, fmt, sync::Arc};

use http::StatusCode;
use tracing::Dispatch;

use crate::{
    core::{
        context::{Params, Request, Response},
        error::{RouteError, RouteResult},
        fault::{self, DiagnosticFn, HandlerResult, Invocation},
        method::Method,
        trie::{Insertion, Node},
    },
    ports::transport::ResponseWriter,
};

/// A route handler. Cheap to clone.
pub type Handler = Arc<dyn Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync>;

/// Wrap a closure or function as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Split a request path into trie segments, dropping the leading empty one.
///
/// Returns `None` for paths without a leading `/`.
fn split_path(path: &str) -> Option<Vec<&str>> {
    path.strip_prefix('/').map(|rest| rest.split('/').collect())
}

fn in_scope<R>(logger: Option<&Dispatch>, f: impl FnOnce() -> R) -> R {
    match logger {
        Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
        None => f(),
    }
}

/// Mutable registration phase of a [`Router`].
#[derive(Default)]
pub struct RouterBuilder {
    routes: HashMap<Method, Node>,
    diagnostics: Option<DiagnosticFn>,
    logger: Option<Dispatch>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` + `path`.
    ///
    /// Segments starting with `:` capture a single path segment. A capture in
    /// the last position is a tail wildcard; only one may exist per position.
    pub fn route<F>(&mut self, method: Method, path: &str, handler: F) -> RouteResult<&mut Self>
    where
        F: Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.add(method, path, Arc::new(handler))?;
        Ok(self)
    }

    /// Register using a string method key, rejecting anything outside [`Method::ALL`].
    pub fn route_str<F>(&mut self, method: &str, path: &str, handler: F) -> RouteResult<&mut Self>
    where
        F: Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        let method = method.parse::<Method>()?;
        self.route(method, path, handler)
    }

    /// Register an already wrapped [`Handler`].
    pub fn add(&mut self, method: Method, path: &str, handler: Handler) -> RouteResult<()> {
        let segments = split_path(path).ok_or_else(|| RouteError::MalformedPath(path.to_string()))?;
        let insertion = self
            .routes
            .entry(method)
            .or_default()
            .insert(&segments, handler, path)?;

        in_scope(self.logger.as_ref(), || match insertion {
            Insertion::Added => tracing::debug!(%method, path, "Registered route"),
            Insertion::Replaced => {
                tracing::warn!(%method, path, "Route registered twice; replacing earlier handler")
            }
        });
        Ok(())
    }

    pub fn get<F>(&mut self, path: &str, handler: F) -> RouteResult<&mut Self>
    where
        F: Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::Get, path, handler)
    }

    pub fn post<F>(&mut self, path: &str, handler: F) -> RouteResult<&mut Self>
    where
        F: Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::Post, path, handler)
    }

    pub fn put<F>(&mut self, path: &str, handler: F) -> RouteResult<&mut Self>
    where
        F: Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::Put, path, handler)
    }

    pub fn delete<F>(&mut self, path: &str, handler: F) -> RouteResult<&mut Self>
    where
        F: Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::Delete, path, handler)
    }

    pub fn options<F>(&mut self, path: &str, handler: F) -> RouteResult<&mut Self>
    where
        F: Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::Options, path, handler)
    }

    /// Callback whose value becomes the `data` field of every fault report.
    pub fn diagnostics<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn() -> eyre::Result<serde_json::Value> + Send + Sync + 'static,
    {
        self.diagnostics = Some(Arc::new(callback));
        self
    }

    /// Send the router's log events to `logger` instead of the ambient default.
    pub fn logger(&mut self, logger: Dispatch) -> &mut Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Router {
        let router = Router {
            routes: self.routes,
            diagnostics: self.diagnostics,
            logger: self.logger,
        };
        in_scope(router.logger.as_ref(), || {
            tracing::info!(routes = router.route_count(), "Router built");
        });
        router
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes: usize = self.routes.values().map(Node::route_count).sum();
        f.debug_struct("RouterBuilder")
            .field("routes", &routes)
            .field("diagnostics", &self.diagnostics.is_some())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// How a dispatched request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran to completion. A handler that wrote nothing is answered
    /// with an empty `200 OK`.
    Handled,
    /// No route matched; a 404 was written.
    NotFound,
    /// The handler failed. `reported` is false if the 500 could not be written.
    Faulted { reported: bool },
}

/// Immutable route table plus fault reporting configuration.
pub struct Router {
    routes: HashMap<Method, Node>,
    diagnostics: Option<DiagnosticFn>,
    logger: Option<Dispatch>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    fn find(&self, method: &http::Method, path: &str) -> Option<(&Handler, Params)> {
        let method = Method::try_from(method).ok()?;
        let root = self.routes.get(&method)?;
        let segments = split_path(path)?;

        let mut params = Params::new();
        let handler = root.find(&segments, &mut params)?;
        Some((handler, params))
    }

    /// Match without invoking anything; returns the parameter bindings.
    pub fn lookup(&self, method: &http::Method, path: &str) -> Option<Params> {
        self.find(method, path).map(|(_, params)| params)
    }

    /// Route `request` and write exactly one response to `writer`.
    ///
    /// Never fails: an unmatched request gets a 404 and a handler fault a 500
    /// (or nothing further, if the handler had already sent headers).
    pub fn dispatch(&self, request: Request, writer: &mut dyn ResponseWriter) -> DispatchOutcome {
        in_scope(self.logger.as_ref(), || self.dispatch_inner(request, writer))
    }

    fn dispatch_inner(&self, mut request: Request, writer: &mut dyn ResponseWriter) -> DispatchOutcome {
        let mut response = Response::new(writer);

        let Some((handler, params)) = self.find(request.method(), request.path()) else {
            tracing::debug!(
                http.method = %request.method(),
                http.path = request.path(),
                "No route matched"
            );
            response.content_type("text/plain");
            if let Err(e) = response.respond(StatusCode::NOT_FOUND, "Not Found") {
                tracing::error!(error = %e, "Failed to write 404 response");
            }
            return DispatchOutcome::NotFound;
        };

        request.set_params(params);
        match fault::invoke_handler(handler, &request, &mut response, self.diagnostics.as_ref()) {
            Invocation::Completed => {
                if !response.headers_sent() {
                    tracing::debug!(
                        http.path = request.path(),
                        "Handler wrote nothing; sending empty 200"
                    );
                    if let Err(e) = response.respond(StatusCode::OK, "") {
                        tracing::error!(error = %e, "Failed to write empty response");
                    }
                }
                DispatchOutcome::Handled
            }
            Invocation::Faulted { reported } => DispatchOutcome::Faulted { reported },
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.values().map(Node::route_count).sum()
    }

    /// Every registered `(method, pattern)` pair, ordered by method then pattern.
    pub fn routes(&self) -> Vec<(Method, String)> {
        Method::ALL
            .into_iter()
            .filter_map(|method| self.routes.get(&method).map(|root| (method, root)))
            .flat_map(|(method, root)| {
                root.patterns()
                    .into_iter()
                    .map(move |pattern| (method, pattern))
            })
            .collect()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use eyre::eyre;

    use super::*;
    use crate::{
        adapters::{BufferedResponseWriter, WrittenResponse},
        core::fault::FaultReport,
    };

    fn send(router: &Router, method: http::Method, path: &str) -> (DispatchOutcome, WrittenResponse) {
        let mut writer = BufferedResponseWriter::new();
        let outcome = router.dispatch(Request::new(method, path), &mut writer);
        (outcome, writer.into_written())
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(&Request, &mut Response<'_>) -> HandlerResult + Send + Sync + 'static {
        let counter = counter.clone();
        move |_, res| {
            counter.fetch_add(1, Ordering::SeqCst);
            res.ok("ok")?;
            Ok(())
        }
    }

    #[test]
    fn test_literal_route_invoked_exactly_once() {
        let hits_a = Arc::new(AtomicUsize::new(0));
        let hits_b = Arc::new(AtomicUsize::new(0));
        let mut builder = Router::builder();
        builder
            .get("/a", counting(&hits_a))
            .unwrap()
            .get("/b", counting(&hits_b))
            .unwrap();
        let router = builder.build();

        let (outcome, written) = send(&router, http::Method::GET, "/a");
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(written.status, StatusCode::OK);
        assert_eq!(hits_a.load(Ordering::SeqCst), 1);
        assert_eq!(hits_b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_infix_wildcard_binding() {
        let seen = Arc::new(Mutex::new(None));
        let seen_in_handler = seen.clone();
        let mut builder = Router::builder();
        builder
            .get("/blog/:id/comments", move |req, res| {
                *seen_in_handler.lock().unwrap() = req.param(":id").map(str::to_string);
                res.ok("")?;
                Ok(())
            })
            .unwrap();
        let router = builder.build();

        send(&router, http::Method::GET, "/blog/42/comments");
        assert_eq!(seen.lock().unwrap().as_deref(), Some("42"));
    }

    #[test]
    fn test_tail_wildcard_binding() {
        let mut builder = Router::builder();
        builder
            .get("/files/:name", |req, res| {
                let name = req.param("name").unwrap_or_default().to_string();
                res.ok(name)?;
                Ok(())
            })
            .unwrap();
        let router = builder.build();

        let (_, written) = send(&router, http::Method::GET, "/files/report.pdf");
        assert_eq!(&written.body[..], b"report.pdf");
        assert_eq!(
            router.lookup(&http::Method::GET, "/files/x").unwrap()[":name"],
            "x"
        );
    }

    #[test]
    fn test_unmatched_path_is_404() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut builder = Router::builder();
        builder.get("/a", counting(&hits)).unwrap();
        let router = builder.build();

        let (outcome, written) = send(&router, http::Method::GET, "/nope");
        assert_eq!(outcome, DispatchOutcome::NotFound);
        assert_eq!(written.status, StatusCode::NOT_FOUND);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_method_without_routes_is_404() {
        let mut builder = Router::builder();
        builder.get("/a", |_, _| Ok(())).unwrap();
        let router = builder.build();

        assert_eq!(send(&router, http::Method::POST, "/a").0, DispatchOutcome::NotFound);
        assert_eq!(send(&router, http::Method::PATCH, "/a").0, DispatchOutcome::NotFound);
    }

    #[test]
    fn test_malformed_path_rejected() {
        let mut builder = Router::builder();
        let err = builder.get("blog", |_, _| Ok(())).unwrap_err();
        assert_eq!(err, RouteError::MalformedPath("blog".to_string()));

        let err = builder.get("", |_, _| Ok(())).unwrap_err();
        assert_eq!(err, RouteError::MalformedPath(String::new()));
    }

    #[test]
    fn test_duplicate_tail_wildcard_rejected() {
        let mut builder = Router::builder();
        builder.get("/files/:name", |_, _| Ok(())).unwrap();
        let err = builder.get("/files/:id", |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateTailWildcard { .. }));

        // Same position under another method is a different trie.
        assert!(builder.post("/files/:id", |_, _| Ok(())).is_ok());
    }

    #[test]
    fn test_unknown_method_key_rejected() {
        let mut builder = Router::builder();
        let err = builder.route_str("PATCH", "/a", |_, _| Ok(())).unwrap_err();
        assert_eq!(err, RouteError::UnsupportedMethod("PATCH".to_string()));
        assert!(builder.route_str("PUT", "/a", |_, _| Ok(())).is_ok());
    }

    #[test]
    fn test_literal_takes_precedence() {
        let mut builder = Router::builder();
        builder
            .get("/a/:x", |_, res| Ok(res.ok("wildcard")?))
            .unwrap()
            .get("/a/b", |_, res| Ok(res.ok("literal")?))
            .unwrap();
        let router = builder.build();

        assert_eq!(&send(&router, http::Method::GET, "/a/b").1.body[..], b"literal");
        assert_eq!(&send(&router, http::Method::GET, "/a/c").1.body[..], b"wildcard");
    }

    #[test]
    fn test_fault_yields_500_report() {
        let mut builder = Router::builder();
        builder
            .delete("/items/:id", |req, _| {
                Err(eyre!("item {} is locked", req.param("id").unwrap_or("?")))
            })
            .unwrap();
        builder.diagnostics(|| Ok(serde_json::json!({ "queue_depth": 7 })));
        let router = builder.build();

        let (outcome, written) = send(&router, http::Method::DELETE, "/items/9");
        assert_eq!(outcome, DispatchOutcome::Faulted { reported: true });
        assert_eq!(written.status, StatusCode::INTERNAL_SERVER_ERROR);

        let report: FaultReport = serde_json::from_slice(&written.body).unwrap();
        assert_eq!(report.value, "item 9 is locked");
        assert_eq!(report.data, serde_json::json!({ "queue_depth": 7 }));
    }

    #[test]
    fn test_repeated_dispatch_is_idempotent() {
        let mut builder = Router::builder();
        builder.get("/u/:user/p/:page", |_, _| Ok(())).unwrap();
        let router = builder.build();

        let first = router.lookup(&http::Method::GET, "/u/ann/p/3").unwrap();
        let second = router.lookup(&http::Method::GET, "/u/ann/p/3").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_routes_listing() {
        let mut builder = Router::builder();
        builder
            .post("/echo", |_, _| Ok(()))
            .unwrap()
            .get("/health", |_, _| Ok(()))
            .unwrap()
            .get("/echo/:message", |_, _| Ok(()))
            .unwrap();
        let router = builder.build();

        assert_eq!(router.route_count(), 3);
        assert_eq!(
            router.routes(),
            vec![
                (Method::Get, "/echo/:message".to_string()),
                (Method::Get, "/health".to_string()),
                (Method::Post, "/echo".to_string()),
            ]
        );
    }

    #[test]
    fn test_router_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Router>();
    }

    #[test]
    fn test_silent_handler_gets_empty_200() {
        let mut builder = Router::builder();
        builder.post("/ping", |_, _| Ok(())).unwrap();
        let router = builder.build();

        let (outcome, written) = send(&router, http::Method::POST, "/ping");
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert!(written.committed);
        assert_eq!(written.status, StatusCode::OK);
        assert_eq!(written.headers[http::header::CONTENT_LENGTH], "0");
        assert!(written.body.is_empty());
    }

    #[test]
    fn test_builder_debug() {
        let mut builder = Router::builder();
        builder.get("/a", |_, _| Ok(())).unwrap();
        builder.diagnostics(|| Ok(serde_json::Value::Null));

        let rendered = format!("{builder:?}");
        assert!(rendered.contains("routes: 1"));
        assert!(rendered.contains("diagnostics: true"));
        assert!(rendered.contains("logger: false"));
    }
}
