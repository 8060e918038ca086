use std::{future::IntoFuture, sync::Arc};

use axum::extract::Request;
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{adapters::HttpHandler, utils::GracefulShutdown};

/// Build the axum application: every method and path goes to `handler`.
pub fn app(handler: Arc<HttpHandler>) -> axum::Router {
    axum::Router::new()
        .fallback(move |req: Request| {
            let handler = handler.clone();
            async move { handler.handle_request(req).await }
        })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Serve `app` on `listener` until a shutdown signal arrives, then give
/// in-flight requests up to the shutdown timeout to finish.
pub async fn serve(
    listener: TcpListener,
    app: axum::Router,
    shutdown: &GracefulShutdown,
) -> Result<()> {
    let local_addr = listener.local_addr().context("Failed to get local addr")?;
    tracing::info!("Waypoint server listening on {}", local_addr);

    let mut stop_token = shutdown.shutdown_token();
    let mut drain_token = shutdown.shutdown_token();
    let drain_timeout = shutdown.shutdown_timeout();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = stop_token.wait_for_shutdown().await;
            tracing::info!("Shutdown signal received: {:?}; draining requests", reason);
        })
        .into_future();

    tokio::select! {
        result = server => result.context("Server error"),
        _ = async move {
            drain_token.wait_for_shutdown().await;
            tokio::time::sleep(drain_timeout).await;
        } => {
            tracing::warn!(
                "Shutdown timeout exceeded ({:?}), abandoning in-flight requests",
                drain_timeout
            );
            Ok(())
        }
    }
}
