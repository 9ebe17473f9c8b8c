//! Vaani server binary — the main entry point for the voice assistant.
//!
//! Starts an axum HTTP server with structured logging, the in-process
//! session store, HTTP inference ports, and graceful shutdown on
//! SIGTERM/SIGINT.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use vaani_inference::{HttpReasoning, HttpSynthesis, HttpTranscription};
use vaani_pipeline::PipelineOrchestrator;
use vaani_server::{app, background, AppState};
use vaani_session::SessionStore;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("VAANI_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    if config.inference.transcription_url.is_empty()
        || config.inference.reasoning_url.is_empty()
        || config.inference.synthesis_url.is_empty()
    {
        tracing::warn!(
            "one or more inference endpoint URLs are unset — turns will fail until configured"
        );
    }

    // One shared HTTP client for all three inference ports.
    let client = reqwest::Client::builder()
        .build()
        .expect("failed to build HTTP client");

    let store = Arc::new(SessionStore::new(
        Duration::from_secs(config.session.ttl_secs),
        config.session.history_bound,
    ));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::clone(&store),
        Arc::new(HttpTranscription::new(client.clone(), &config.inference)),
        Arc::new(HttpReasoning::new(client.clone(), &config.inference)),
        Arc::new(HttpSynthesis::new(client, &config.inference)),
    ));

    let state = Arc::new(AppState::new(orchestrator));
    let connections = Arc::clone(&state.connections);

    // Background expiry sweep
    tokio::spawn(background::start_expiry_sweep(
        Arc::clone(&store),
        config.session.sweep_interval_secs,
    ));

    // Build application
    let app = app(Arc::clone(&state));
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting vaani server");
    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    connections.close_all().await;
    tracing::info!("vaani server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
