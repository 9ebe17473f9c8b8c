//! Peer-connection signaling handlers (offer/answer and ICE).

use crate::api::ApiError;
use crate::AppState;
use axum::extract::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use vaani_signal::{IceCandidate, SessionDescription, SignalError};

/// Outbound reply buffer per negotiated connection. Replies queue here until
/// the session's WebSocket attaches; beyond this the oldest turn results are
/// effectively dropped by backpressure.
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

impl From<SignalError> for ApiError {
    fn from(e: SignalError) -> Self {
        match e {
            SignalError::SessionNotFound(id) => {
                ApiError::NotFound(format!("session not found: {id}"))
            }
            SignalError::InvalidOffer(msg) => ApiError::BadRequest(msg),
            SignalError::NoConnection(id) => {
                ApiError::NotFound(format!("no active connection for session: {id}"))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub session_id: String,
    pub offer: SessionDescription,
}

#[derive(Debug, Serialize)]
pub struct OfferResponse {
    pub answer: SessionDescription,
}

/// Handler for `POST /api/voice/webrtc/offer`.
///
/// Negotiates a peer connection for the session and parks the reply channel
/// until the session's WebSocket picks it up.
pub async fn offer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<OfferRequest>,
) -> Result<Json<OfferResponse>, ApiError> {
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
    let answer = state
        .connections
        .handle_offer(&payload.session_id, payload.offer, outbound_tx)
        .await?;

    state
        .pending_outbound
        .lock()
        .await
        .insert(payload.session_id, outbound_rx);

    Ok(Json(OfferResponse { answer }))
}

#[derive(Debug, Deserialize)]
pub struct IceRequest {
    pub session_id: String,
    pub candidate: IceCandidate,
}

/// Handler for `POST /api/voice/webrtc/ice`.
///
/// Always acknowledges: candidates racing ahead of or behind negotiation are
/// logged and ignored, never an error.
pub async fn ice_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<IceRequest>,
) -> Json<serde_json::Value> {
    state
        .connections
        .handle_ice_candidate(&payload.session_id, payload.candidate)
        .await;
    Json(serde_json::json!({ "status": "ok" }))
}
