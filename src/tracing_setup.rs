use eyre::{Result, WrapErr};
use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

use crate::config::models::{LogFormat, LoggingConfig};

/// Build a subscriber for the given logging configuration without installing it.
///
/// The returned `Dispatch` can be handed to `RouterBuilder::logger` as well as
/// installed globally with [`init_tracing`].
pub fn build_dispatch(config: &LoggingConfig) -> Result<Dispatch> {
    let env_filter = EnvFilter::try_new(&config.level)
        .wrap_err_with(|| format!("Invalid log level: {}", config.level))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let dispatch = match config.format {
        LogFormat::Json => Dispatch::new(
            Registry::default().with(env_filter).with(
                fmt_layer
                    .json()
                    .with_current_span(config.include_spans)
                    .with_span_list(config.include_spans),
            ),
        ),
        LogFormat::Pretty => Dispatch::new(
            Registry::default()
                .with(env_filter)
                .with(fmt_layer.pretty().with_ansi(true)),
        ),
    };
    Ok(dispatch)
}

/// Initialize structured logging and install it as the process default.
///
/// Returns the installed dispatcher so it can also be injected where needed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Dispatch> {
    let dispatch = build_dispatch(config)?;
    tracing::dispatcher::set_global_default(dispatch.clone())
        .wrap_err("A global tracing subscriber is already installed")?;

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        spans = config.include_spans,
        "Waypoint logging initialized"
    );
    Ok(dispatch)
}

/// Create a request-scoped tracing span
pub fn create_request_span(method: &str, path: &str, request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.path = path,
        request.id = request_id,
        http.status_code = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    )
}
