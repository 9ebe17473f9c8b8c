//! HTTP implementations of the inference ports.
//!
//! Each port posts a JSON request to a configured endpoint and expects a JSON
//! response. The wire contract is deliberately small so any compliant backend
//! can be substituted:
//!
//! - transcription: `{ "audio": <base64>, "language": <tag> }` → `{ "text": .. }`
//! - reasoning: `{ "system_instruction": .., "contents": [{ "role": "user"|"model",
//!   "parts": [..] }] }` → `{ "text": .. }`
//! - synthesis: `{ "text": .., "language": .., "voice": .. }` → `{ "audio": <base64> }`
//!
//! Every call carries a bounded timeout; timeouts are reported as the port's
//! failure variant and are never retried here.

use crate::{InferenceConfig, InferenceError, ReasoningPort, ReasoningTurn, SynthesisPort,
            TranscriptionPort};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vaani_types::Role;

/// Maximum audio input size for transcription (10 MiB). Prevents OOM from
/// oversized payloads.
const MAX_TRANSCRIPTION_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Maximum text input size for synthesis (64 KiB).
const MAX_SYNTHESIS_INPUT_BYTES: usize = 64 * 1024;

fn encode_audio(audio: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(audio)
}

fn decode_audio(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(encoded)
}

#[derive(Debug, Serialize)]
struct TranscriptionRequest<'a> {
    audio: String,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTurn {
    role: String,
    parts: Vec<String>,
}

impl WireTurn {
    fn new(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![text.into()],
        }
    }
}

#[derive(Debug, Serialize)]
struct ReasoningRequest<'a> {
    system_instruction: &'a str,
    contents: Vec<WireTurn>,
}

#[derive(Debug, Deserialize)]
struct ReasoningResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    language: &'a str,
    voice: &'a str,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    audio: String,
}

/// Translates conversation turns into the reasoning wire shape.
///
/// The backend labels assistant turns "model"; a system-instruction preamble
/// is carried in its own field, so `contents` holds only the conversation.
fn to_wire_turns(history: &[ReasoningTurn], prompt: &str) -> Vec<WireTurn> {
    let mut contents: Vec<WireTurn> = history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            WireTurn::new(role, turn.text.clone())
        })
        .collect();
    contents.push(WireTurn::new("user", prompt));
    contents
}

fn apply_auth(request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
    if api_key.is_empty() {
        request
    } else {
        request.bearer_auth(api_key)
    }
}

fn describe(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    }
}

/// Speech-to-text over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTranscription {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpTranscription {
    pub fn new(client: reqwest::Client, config: &InferenceConfig) -> Self {
        Self {
            client,
            url: config.transcription_url.clone(),
            api_key: config.speech_api_key.clone(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl TranscriptionPort for HttpTranscription {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, InferenceError> {
        if audio.len() > MAX_TRANSCRIPTION_INPUT_BYTES {
            return Err(InferenceError::Transcription(format!(
                "audio exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_TRANSCRIPTION_INPUT_BYTES
            )));
        }

        tracing::debug!(bytes = audio.len(), language, "transcribing audio");

        let request = TranscriptionRequest {
            audio: encode_audio(audio),
            language,
        };
        let response = apply_auth(self.client.post(&self.url), &self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Transcription(describe(e)))?
            .error_for_status()
            .map_err(|e| InferenceError::Transcription(e.to_string()))?;

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Transcription(format!("malformed response: {e}")))?;

        Ok(body.text)
    }
}

/// Language-model reasoning over HTTP.
#[derive(Debug, Clone)]
pub struct HttpReasoning {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpReasoning {
    pub fn new(client: reqwest::Client, config: &InferenceConfig) -> Self {
        Self {
            client,
            url: config.reasoning_url.clone(),
            api_key: config.reasoning_api_key.clone(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl ReasoningPort for HttpReasoning {
    async fn generate(
        &self,
        prompt: &str,
        history: &[ReasoningTurn],
        system_instruction: &str,
    ) -> Result<String, InferenceError> {
        tracing::debug!(
            history_turns = history.len(),
            prompt_len = prompt.len(),
            "generating response"
        );

        let request = ReasoningRequest {
            system_instruction,
            contents: to_wire_turns(history, prompt),
        };
        let response = apply_auth(self.client.post(&self.url), &self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Reasoning(describe(e)))?
            .error_for_status()
            .map_err(|e| InferenceError::Reasoning(e.to_string()))?;

        let body: ReasoningResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Reasoning(format!("malformed response: {e}")))?;

        if body.text.trim().is_empty() {
            return Err(InferenceError::Reasoning("empty response text".to_string()));
        }
        Ok(body.text)
    }
}

/// Text-to-speech over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSynthesis {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpSynthesis {
    pub fn new(client: reqwest::Client, config: &InferenceConfig) -> Self {
        Self {
            client,
            url: config.synthesis_url.clone(),
            api_key: config.speech_api_key.clone(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl SynthesisPort for HttpSynthesis {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
    ) -> Result<Vec<u8>, InferenceError> {
        if text.len() > MAX_SYNTHESIS_INPUT_BYTES {
            return Err(InferenceError::Synthesis(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_SYNTHESIS_INPUT_BYTES
            )));
        }

        tracing::debug!(text_len = text.len(), language, voice, "synthesizing speech");

        let request = SynthesisRequest {
            text,
            language,
            voice,
        };
        let response = apply_auth(self.client.post(&self.url), &self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Synthesis(describe(e)))?
            .error_for_status()
            .map_err(|e| InferenceError::Synthesis(e.to_string()))?;

        let body: SynthesisResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Synthesis(format!("malformed response: {e}")))?;

        decode_audio(&body.audio)
            .map_err(|e| InferenceError::Synthesis(format!("invalid audio encoding: {e}")))
    }
}
