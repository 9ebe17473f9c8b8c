//! WebSocket handler for the bidirectional voice channel.

use crate::AppState;
use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use vaani_pipeline::{TurnInput, TurnOutcome};
use vaani_signal::OutboundFrame;

/// Messages a client may send over the voice channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// One complete utterance, base64-encoded.
    Audio { data: String },
    /// A typed turn, bypassing transcription.
    Text { text: String },
    Ping,
}

/// Messages the server sends back.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    AudioResponse { data: String },
    TextResponse { text: String },
    Pong,
    Error { message: String },
}

/// Handler for `GET /ws/voice/{session_id}`.
///
/// Rejects the upgrade with 404 when the session does not exist.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if state.store.get(&session_id).await.is_err() {
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session_id: String) {
    let (mut sender, mut receiver) = socket.split();

    // Bounded channel per socket so a slow client cannot grow memory without
    // limit; past 256 queued messages the client is too slow and loses them.
    let (tx, mut rx) = mpsc::channel::<String>(256);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // If a peer connection was negotiated over HTTP for this session, its
    // turn replies drain out through this socket.
    let bridge_task = {
        let pending = state.pending_outbound.lock().await.remove(&session_id);
        pending.map(|mut outbound_rx| {
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(frame) = outbound_rx.recv().await {
                    let msg = match frame {
                        OutboundFrame::Text(text) => ServerMessage::TextResponse { text },
                        OutboundFrame::Audio(audio) => ServerMessage::AudioResponse {
                            data: base64::engine::general_purpose::STANDARD.encode(audio),
                        },
                    };
                    if send_server_message(&tx, &msg).is_err() {
                        break;
                    }
                }
            })
        })
    };

    tracing::info!(session_id = %session_id, "voice websocket connected");

    while let Some(Ok(msg)) = receiver.next().await {
        let AxumMessage::Text(text) = msg else {
            continue;
        };
        let Ok(incoming) = serde_json::from_str::<ClientMessage>(&text) else {
            // Unrecognized message types are ignored by contract.
            tracing::debug!(session_id = %session_id, "ignoring unrecognized ws message");
            continue;
        };

        match incoming {
            ClientMessage::Ping => {
                let _ = send_server_message(&tx, &ServerMessage::Pong);
            }
            ClientMessage::Audio { data } => {
                let audio = match base64::engine::general_purpose::STANDARD.decode(&data) {
                    Ok(audio) => audio,
                    Err(_) => {
                        send_ws_error(&tx, "invalid base64 audio payload".to_string());
                        continue;
                    }
                };
                run_ws_turn(&state, &session_id, TurnInput::Audio(audio), &tx).await;
            }
            ClientMessage::Text { text } => {
                if text.trim().is_empty() {
                    send_ws_error(&tx, "empty text".to_string());
                    continue;
                }
                run_ws_turn(&state, &session_id, TurnInput::Text(text), &tx).await;
            }
        }
    }

    send_task.abort();
    if let Some(bridge) = bridge_task {
        bridge.abort();
    }
    tracing::info!(session_id = %session_id, "voice websocket disconnected");
}

/// Runs one turn and pushes the reply (text first, then audio) to the socket.
async fn run_ws_turn(
    state: &AppState,
    session_id: &str,
    input: TurnInput,
    tx: &mpsc::Sender<String>,
) {
    match state.orchestrator.run_turn(session_id, input).await {
        Ok(TurnOutcome::Reply(output)) => {
            let _ = send_server_message(tx, &ServerMessage::TextResponse { text: output.text });
            if !output.audio.is_empty() {
                let _ = send_server_message(
                    tx,
                    &ServerMessage::AudioResponse {
                        data: base64::engine::general_purpose::STANDARD.encode(output.audio),
                    },
                );
            }
        }
        Ok(TurnOutcome::NoSpeech) => {
            send_ws_error(tx, "no speech detected".to_string());
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "websocket turn failed");
            send_ws_error(tx, e.to_string());
        }
    }
}

fn send_server_message(tx: &mpsc::Sender<String>, msg: &ServerMessage) -> Result<(), ()> {
    match serde_json::to_string(msg) {
        Ok(json) => tx.try_send(json).map_err(|_| ()),
        Err(e) => {
            tracing::error!("failed to serialize websocket message: {}", e);
            Err(())
        }
    }
}

fn send_ws_error(tx: &mpsc::Sender<String>, message: String) {
    if send_server_message(tx, &ServerMessage::Error { message }).is_err() {
        tracing::warn!("failed to send websocket error to client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vaani_inference::{
        InferenceError, ReasoningPort, ReasoningTurn, SynthesisPort, TranscriptionPort,
    };
    use vaani_pipeline::PipelineOrchestrator;
    use vaani_session::SessionStore;

    struct FixedTranscription(&'static str);

    #[async_trait]
    impl TranscriptionPort for FixedTranscription {
        async fn transcribe(&self, _audio: &[u8], _language: &str) -> Result<String, InferenceError> {
            Ok(self.0.to_string())
        }
    }

    struct FixedReasoning(&'static str);

    #[async_trait]
    impl ReasoningPort for FixedReasoning {
        async fn generate(
            &self,
            _prompt: &str,
            _history: &[ReasoningTurn],
            _system_instruction: &str,
        ) -> Result<String, InferenceError> {
            Ok(self.0.to_string())
        }
    }

    struct FixedSynthesis(Vec<u8>);

    #[async_trait]
    impl SynthesisPort for FixedSynthesis {
        async fn synthesize(
            &self,
            _text: &str,
            _language: &str,
            _voice: &str,
        ) -> Result<Vec<u8>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    fn state_with(
        transcript: &'static str,
        reply: &'static str,
        audio: Vec<u8>,
    ) -> Arc<AppState> {
        let store = Arc::new(SessionStore::default());
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            store,
            Arc::new(FixedTranscription(transcript)),
            Arc::new(FixedReasoning(reply)),
            Arc::new(FixedSynthesis(audio)),
        ));
        Arc::new(AppState::new(orchestrator))
    }

    fn parse(json: &str) -> Result<ClientMessage, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[test]
    fn client_message_tags_parse() {
        assert!(matches!(
            parse(r#"{"type": "audio", "data": "AAAA"}"#),
            Ok(ClientMessage::Audio { .. })
        ));
        assert!(matches!(
            parse(r#"{"type": "text", "text": "hello"}"#),
            Ok(ClientMessage::Text { .. })
        ));
        assert!(matches!(parse(r#"{"type": "ping"}"#), Ok(ClientMessage::Ping)));
    }

    #[test]
    fn unrecognized_client_message_fails_to_parse() {
        assert!(parse(r#"{"type": "subscribe", "channel": "voice"}"#).is_err());
        assert!(parse(r#"{"data": "AAAA"}"#).is_err());
    }

    #[test]
    fn server_message_tags() {
        let text = serde_json::to_value(ServerMessage::TextResponse {
            text: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(text["type"], "text_response");
        assert_eq!(text["text"], "hi");

        let audio = serde_json::to_value(ServerMessage::AudioResponse {
            data: "UklGRg==".to_string(),
        })
        .unwrap();
        assert_eq!(audio["type"], "audio_response");

        let pong = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(pong["type"], "pong");

        let error = serde_json::to_value(ServerMessage::Error {
            message: "bad".to_string(),
        })
        .unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "bad");
    }

    #[tokio::test]
    async fn turn_reply_sends_text_then_audio() {
        let state = state_with("what is this", "a detection result", vec![0xAB; 32]);
        let session = state.store.create(None, "hi-IN", "meera").await;
        let (tx, mut rx) = mpsc::channel::<String>(8);

        run_ws_turn(&state, &session.session_id, TurnInput::Text("hello".into()), &tx).await;

        let first: serde_json::Value =
            serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["type"], "text_response");
        assert_eq!(first["text"], "a detection result");

        let second: serde_json::Value =
            serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(second["type"], "audio_response");
        assert_eq!(
            second["data"],
            base64::engine::general_purpose::STANDARD.encode(vec![0xAB; 32])
        );

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn silent_audio_reports_no_speech() {
        let state = state_with("   ", "unused", vec![1, 2, 3]);
        let session = state.store.create(None, "hi-IN", "meera").await;
        let (tx, mut rx) = mpsc::channel::<String>(8);

        run_ws_turn(
            &state,
            &session.session_id,
            TurnInput::Audio(vec![0u8; 64]),
            &tx,
        )
        .await;

        let msg: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "error");
        assert_eq!(msg["message"], "no speech detected");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn degraded_turn_omits_the_audio_message() {
        let state = state_with("hello", "text only reply", Vec::new());
        let session = state.store.create(None, "hi-IN", "meera").await;
        let (tx, mut rx) = mpsc::channel::<String>(8);

        run_ws_turn(&state, &session.session_id, TurnInput::Text("hi".into()), &tx).await;

        let msg: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "text_response");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_session_turn_sends_an_error() {
        let state = state_with("hello", "unused", Vec::new());
        let (tx, mut rx) = mpsc::channel::<String>(8);

        run_ws_turn(&state, "missing", TurnInput::Text("hi".into()), &tx).await;

        let msg: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(msg["type"], "error");
    }
}
