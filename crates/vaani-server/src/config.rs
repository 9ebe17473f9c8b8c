//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use vaani_inference::InferenceConfig;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session store settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Inference backend endpoints and credentials.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle TTL in seconds before a session expires.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum conversation history entries retained per session.
    #[serde(default = "default_history_bound")]
    pub history_bound: usize,

    /// Interval in seconds between expiry sweeps. 0 disables sweeping
    /// (expiry is still enforced lazily on access).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "vaani_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_session_ttl_secs() -> u64 {
    vaani_session::DEFAULT_SESSION_TTL.as_secs()
}

fn default_history_bound() -> usize {
    vaani_session::DEFAULT_HISTORY_BOUND
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            history_bound: default_history_bound(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `VAANI_HOST` overrides `server.host`
/// - `VAANI_PORT` overrides `server.port`
/// - `VAANI_SESSION_TTL_SECS` overrides `session.ttl_secs`
/// - `VAANI_LOG_LEVEL` overrides `logging.level`
/// - `VAANI_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `VAANI_SPEECH_API_KEY` overrides `inference.speech_api_key`
/// - `VAANI_REASONING_API_KEY` overrides `inference.reasoning_api_key`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("VAANI_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("VAANI_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(ttl) = std::env::var("VAANI_SESSION_TTL_SECS") {
        if let Ok(parsed) = ttl.parse() {
            config.session.ttl_secs = parsed;
        }
    }
    if let Ok(level) = std::env::var("VAANI_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("VAANI_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(key) = std::env::var("VAANI_SPEECH_API_KEY") {
        config.inference.speech_api_key = key;
    }
    if let Ok(key) = std::env::var("VAANI_REASONING_API_KEY") {
        config.inference.reasoning_api_key = key;
    }

    Ok(config)
}
