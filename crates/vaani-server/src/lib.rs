//! Vaani server library — HTTP and WebSocket API over the voice pipeline.

pub mod api;
pub mod api_signal;
pub mod api_ws;
pub mod background;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vaani_pipeline::PipelineOrchestrator;
use vaani_session::SessionStore;
use vaani_signal::{ConnectionManager, OutboundFrame};

/// Maximum request body size (16 MiB). Audio payloads arrive base64-encoded
/// in JSON, so this caps one utterance at roughly 12 MiB of raw audio.
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state, constructed once at startup and injected into
/// every handler. No ambient singletons.
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub connections: Arc<ConnectionManager>,
    /// Outbound reply receivers for peer connections negotiated over HTTP,
    /// parked here until the session's WebSocket attaches and drains them.
    pub pending_outbound: Mutex<HashMap<String, mpsc::Receiver<OutboundFrame>>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        let store = Arc::clone(orchestrator.store());
        let connections = Arc::new(ConnectionManager::new(Arc::clone(&orchestrator)));
        Self {
            store,
            orchestrator,
            connections,
            pending_outbound: Mutex::new(HashMap::new()),
        }
    }
}

/// Health check handler.
///
/// Returns `200 OK` with server status, version, and the number of active
/// sessions. Used by load balancers and monitoring.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let active_sessions = state.store.list_active().await.len();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": active_sessions,
    }))
}

/// Builds the application router with all routes.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/voice/session", post(api::create_session_handler))
        .route(
            "/api/voice/session/{session_id}",
            get(api::get_session_handler)
                .patch(api::update_session_handler)
                .delete(api::delete_session_handler),
        )
        .route("/api/voice/text", post(api::text_turn_handler))
        .route("/api/voice/results", post(api::set_results_handler))
        .route("/api/voice/webrtc/offer", post(api_signal::offer_handler))
        .route("/api/voice/webrtc/ice", post(api_signal::ice_handler))
        .route("/ws/voice/{session_id}", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(state))
}
