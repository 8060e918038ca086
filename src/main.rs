use std::{
    net::SocketAddr,
    path::Path,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use clap::Parser;
use color_eyre::{Result, eyre::Context};
use http::StatusCode;
use tracing::Dispatch;
use waypoint::{
    Router,
    adapters::{self, HttpHandler},
    config::{ServerConfigValidator, loader::load_config, models::ServerConfig},
    core::RouteResult,
    tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Start the server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve_command(&config).await,
        None => serve_command(&args.config).await,
    }
}

/// Routes served by the `waypoint` binary.
fn build_router(logger: Dispatch) -> RouteResult<Router> {
    let started = Instant::now();
    // Filled once the table is frozen; `/routes` reads it back.
    let table: Arc<OnceLock<Vec<String>>> = Arc::new(OnceLock::new());
    let listing = table.clone();
    let mut builder = Router::builder();

    builder
        .get("/health", |_, res| {
            res.json(
                StatusCode::OK,
                &serde_json::json!({
                    "status": "healthy",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                }),
            )
        })?
        .get("/echo/:message", |req, res| {
            res.content_type("text/plain; charset=utf-8");
            res.ok(req.param("message").unwrap_or_default())?;
            Ok(())
        })?
        .post("/echo", |req, res| {
            if let Some(content_type) = req.headers().get(http::header::CONTENT_TYPE) {
                res.header(http::header::CONTENT_TYPE, content_type.clone());
            }
            res.ok(req.body())?;
            Ok(())
        })?
        .get("/files/:name", |req, res| {
            let name = req.param("name").unwrap_or_default();
            let extension = Path::new(name).extension().and_then(|ext| ext.to_str());
            res.json(
                StatusCode::OK,
                &serde_json::json!({ "name": name, "extension": extension }),
            )
        })?
        .get("/routes", move |_, res| {
            let routes = listing.get().map(Vec::as_slice).unwrap_or_default();
            res.json(StatusCode::OK, &serde_json::json!({ "routes": routes }))
        })?;

    builder
        .diagnostics(move || {
            Ok(serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "uptime_secs": started.elapsed().as_secs(),
            }))
        })
        .logger(logger);

    let router = builder.build();
    let listed = router
        .routes()
        .into_iter()
        .map(|(method, pattern)| format!("{method} {pattern}"))
        .collect();
    if table.set(listed).is_err() {
        tracing::warn!("Route listing was already populated; keeping the earlier one");
    }
    Ok(router)
}

async fn serve_command(config_path: &str) -> Result<()> {
    let config: ServerConfig = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    ServerConfigValidator::validate(&config).context("Invalid configuration")?;

    let dispatch = tracing_setup::init_tracing(&config.logging)?;

    let router = build_router(dispatch).context("Failed to register routes")?;
    for (method, pattern) in router.routes() {
        tracing::info!("Configured route: {} {}", method, pattern);
    }

    let handler = Arc::new(HttpHandler::new(Arc::new(router), config.max_body_bytes));

    let graceful_shutdown = Arc::new(GracefulShutdown::with_timeout(Duration::from_secs(
        config.shutdown_timeout_secs,
    )));
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    adapters::serve(listener, adapters::app(handler), &graceful_shutdown).await?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Body Limit: {} bytes", config.max_body_bytes);
            println!("   • Shutdown Timeout: {}s", config.shutdown_timeout_secs);
            println!(
                "   • Logging: {} ({:?})",
                config.logging.level, config.logging.format
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Verify listen address format (e.g., '127.0.0.1:3000')");
            println!("   • Use a valid log filter (e.g., 'info' or 'waypoint=debug')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Waypoint Server Configuration

# The address to listen on
listen_addr = "127.0.0.1:8080"

# Requests with larger bodies are answered with 413
max_body_bytes = 2097152

# Seconds in-flight requests get to finish after SIGINT / SIGTERM
shutdown_timeout_secs = 30

[logging]
# EnvFilter directive, e.g. "info" or "waypoint=debug,tower_http=info"
level = "info"
# "json" or "pretty"
format = "json"
include_spans = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'waypoint serve --config {config_path}' to start the server");
    Ok(())
}
