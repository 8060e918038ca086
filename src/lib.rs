//! Waypoint - a path-trie request router with structured fault reporting.
//!
//! Routes are registered per HTTP method as `/`-separated patterns. Each
//! segment is either a literal (`users`) or a named wildcard (`:id`) that
//! captures exactly one path segment. Literal matches always win over
//! wildcards, and a failed wildcard branch never leaks its bindings into the
//! branch tried next.
//!
//! A handler that returns an error (or panics) is answered with a `500`
//! JSON body carrying the error text, a base64 encoded trace, and optional
//! diagnostics data. Faults raised while producing that report are logged and
//! swallowed so the request still completes.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use waypoint::{HttpHandler, Router, adapters};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let mut builder = Router::builder();
//! builder.get("/users/:id", |req, res| {
//!     res.ok(format!("user {}", req.param("id").unwrap_or_default()))?;
//!     Ok(())
//! })?;
//! let router = Arc::new(builder.build());
//!
//! let handler = Arc::new(HttpHandler::new(router, 2 * 1024 * 1024));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! let shutdown = waypoint::GracefulShutdown::new();
//! adapters::serve(listener, adapters::app(handler), &shutdown).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! `core` holds the trie, the router, and fault reporting, and only talks to
//! the outside world through the [`ports::ResponseWriter`] trait. `adapters`
//! bridge that onto axum/hyper. Configuration, logging setup, and shutdown
//! handling live in `config`, `tracing_setup`, and `utils`.
//!
//! # Error Handling
//! Registration fails with [`RouteError`]. Handlers return `eyre::Result<()>`;
//! attach context with `WrapErr` and it shows up in the fault trace.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{BufferedResponseWriter, HttpHandler},
    core::{
        DispatchOutcome, FaultReport, HandlerResult, Method, Params, Request, Response, RouteError,
        RouteResult, Router, RouterBuilder,
    },
    ports::ResponseWriter,
    utils::GracefulShutdown,
};
