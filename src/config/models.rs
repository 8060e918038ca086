//! Configuration data structures for the waypoint server.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and
//! carry serde defaults so that an empty file is a valid configuration.
use serde::{Deserialize, Serialize};

/// Log output format
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Human readable multi-line output for development
    Pretty,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `waypoint=debug,tower_http=info`
    pub level: String,
    pub format: LogFormat,
    /// Include the span list in JSON events
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_spans: true,
        }
    }
}

/// Top-level server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, `IP:PORT`
    pub listen_addr: String,
    /// Largest request body accepted before answering `413`
    pub max_body_bytes: usize,
    /// How long in-flight requests may take to finish after a shutdown signal
    pub shutdown_timeout_secs: u64,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            shutdown_timeout_secs: 30,
            logging: LoggingConfig::default(),
        }
    }
}
