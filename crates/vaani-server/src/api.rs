//! Session lifecycle and text-turn HTTP handlers.

use crate::AppState;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use vaani_pipeline::{PipelineError, TurnInput, TurnOutcome};
use vaani_types::catalog::{is_supported_language, is_supported_voice, DEFAULT_LANGUAGE,
                           DEFAULT_VOICE};
use vaani_types::{ContextValue, SessionSnapshot, KEY_DETECTION_RESULTS};

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream inference failure: {0}")]
    Upstream(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::SessionNotFound(id) => {
                ApiError::NotFound(format!("session not found: {id}"))
            }
            PipelineError::Transcription(msg) | PipelineError::Reasoning(msg) => {
                ApiError::Upstream(msg)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub language: String,
    pub voice: String,
}

fn validate_language_voice(language: &str, voice: &str) -> Result<(), ApiError> {
    if !is_supported_language(language) {
        return Err(ApiError::BadRequest(format!(
            "unsupported language: {language}"
        )));
    }
    if !is_supported_voice(language, voice) {
        return Err(ApiError::BadRequest(format!(
            "unsupported voice for {language}: {voice}"
        )));
    }
    Ok(())
}

/// Handler for `POST /api/voice/session`.
pub async fn create_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let language = payload.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let voice = payload.voice.unwrap_or_else(|| DEFAULT_VOICE.to_string());
    validate_language_voice(&language, &voice)?;

    let session = state.store.create(payload.user_id, language, voice).await;
    tracing::info!(session_id = %session.session_id, "created voice session");

    Ok(Json(CreateSessionResponse {
        session_id: session.session_id,
        language: session.language,
        voice: session.voice,
    }))
}

/// Handler for `GET /api/voice/session/{session_id}`.
pub async fn get_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state
        .store
        .get(&session_id)
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Handler for `PATCH /api/voice/session/{session_id}`.
///
/// Merges the provided fields; omitted fields are left unchanged.
pub async fn update_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    if payload.voice.is_some() || payload.language.is_some() {
        // Voice availability depends on the language the session ends up
        // with, so validate the effective pair.
        let current = state
            .store
            .get(&session_id)
            .await
            .map_err(|e| ApiError::NotFound(e.to_string()))?;
        let language = payload.language.as_deref().unwrap_or(&current.language);
        let voice = payload.voice.as_deref().unwrap_or(&current.voice);
        validate_language_voice(language, voice)?;
    }

    let session = state
        .store
        .update(
            &session_id,
            vaani_session::SessionUpdate {
                user_id: payload.user_id,
                language: payload.language,
                voice: payload.voice,
            },
        )
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(Json(session))
}

/// Handler for `DELETE /api/voice/session/{session_id}`.
///
/// Also closes any peer connection tracked for the session and discards
/// replies parked for a WebSocket that never attached.
pub async fn delete_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.connections.close(&session_id).await;
    state.pending_outbound.lock().await.remove(&session_id);
    if !state.store.delete(&session_id).await {
        return Err(ApiError::NotFound(format!(
            "session not found: {session_id}"
        )));
    }
    Ok(Json(serde_json::json!({
        "deleted": true,
        "session_id": session_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TextTurnRequest {
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub text: String,
    /// Base64-encoded synthesized audio; empty when synthesis degraded.
    pub audio: String,
    pub language: String,
    pub voice: String,
}

/// Handler for `POST /api/voice/text`.
pub async fn text_turn_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TextTurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("empty text".to_string()));
    }

    let session = state
        .store
        .get(&payload.session_id)
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;

    let outcome = state
        .orchestrator
        .run_turn(&payload.session_id, TurnInput::Text(payload.text))
        .await?;

    match outcome {
        TurnOutcome::Reply(output) => Ok(Json(TurnResponse {
            text: output.text,
            audio: base64::engine::general_purpose::STANDARD.encode(output.audio),
            language: session.language,
            voice: session.voice,
        })),
        // Unreachable for text input; transcription is never invoked.
        TurnOutcome::NoSpeech => Err(ApiError::InternalServerError(
            "no speech outcome for a text turn".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct DetectionResultsRequest {
    pub session_id: String,
    #[serde(default)]
    pub detection_id: Option<String>,
    pub ai_score: f64,
    pub human_score: f64,
    #[serde(default)]
    pub features: serde_json::Value,
}

/// Handler for `POST /api/voice/results`.
///
/// Stores the latest detection results in the session's context so
/// subsequent turns can explain them.
pub async fn set_results_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<DetectionResultsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    for (name, score) in [("ai_score", payload.ai_score), ("human_score", payload.human_score)] {
        if !(0.0..=1.0).contains(&score) {
            return Err(ApiError::BadRequest(format!(
                "{name} must be within [0, 1], got {score}"
            )));
        }
    }

    state
        .store
        .set_context(
            &payload.session_id,
            KEY_DETECTION_RESULTS,
            ContextValue::DetectionResults {
                detection_id: payload.detection_id,
                ai_score: payload.ai_score,
                human_score: payload.human_score,
                features: payload.features,
            },
        )
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
