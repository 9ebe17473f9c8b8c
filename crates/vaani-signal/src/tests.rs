use crate::{
    ConnectionManager, ConnectionState, IceCandidate, OutboundFrame, SessionDescription,
    SignalError, TransportEvent, FRAME_THRESHOLD,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use vaani_inference::{InferenceError, ReasoningPort, ReasoningTurn, SynthesisPort,
                      TranscriptionPort};
use vaani_pipeline::PipelineOrchestrator;
use vaani_session::SessionStore;

struct RecordingTranscription {
    calls: AtomicUsize,
    last_audio: Mutex<Vec<u8>>,
}

#[async_trait]
impl TranscriptionPort for RecordingTranscription {
    async fn transcribe(&self, audio: &[u8], _language: &str) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_audio.lock().unwrap() = audio.to_vec();
        Ok("hello there".to_string())
    }
}

/// Transcription double that parks each call on a semaphore, letting a test
/// hold the consumer task inside a turn.
struct GatedTranscription {
    started: Arc<Notify>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl TranscriptionPort for GatedTranscription {
    async fn transcribe(&self, _audio: &[u8], _language: &str) -> Result<String, InferenceError> {
        self.started.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| InferenceError::Transcription("gate closed".to_string()))?;
        permit.forget();
        Ok("go on".to_string())
    }
}

struct StaticReasoning;

#[async_trait]
impl ReasoningPort for StaticReasoning {
    async fn generate(
        &self,
        _prompt: &str,
        _history: &[ReasoningTurn],
        _system_instruction: &str,
    ) -> Result<String, InferenceError> {
        Ok("hi, how can I help?".to_string())
    }
}

struct StaticSynthesis;

#[async_trait]
impl SynthesisPort for StaticSynthesis {
    async fn synthesize(
        &self,
        _text: &str,
        _language: &str,
        _voice: &str,
    ) -> Result<Vec<u8>, InferenceError> {
        Ok(vec![0xCD; 256])
    }
}

struct Harness {
    store: Arc<SessionStore>,
    transcription: Arc<RecordingTranscription>,
    manager: ConnectionManager,
}

fn harness() -> Harness {
    let store = Arc::new(SessionStore::default());
    let transcription = Arc::new(RecordingTranscription {
        calls: AtomicUsize::new(0),
        last_audio: Mutex::new(Vec::new()),
    });
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::clone(&store),
        transcription.clone(),
        Arc::new(StaticReasoning),
        Arc::new(StaticSynthesis),
    ));
    Harness {
        store,
        transcription,
        manager: ConnectionManager::new(orchestrator),
    }
}

fn offer() -> SessionDescription {
    SessionDescription {
        sdp_type: "offer".to_string(),
        sdp: "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=setup:actpass\r\n".to_string(),
    }
}

async fn wait_for<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

#[tokio::test]
async fn offer_requires_existing_session() {
    let h = harness();
    let (tx, _rx) = mpsc::channel(8);
    let result = h.manager.handle_offer("missing", offer(), tx).await;
    assert!(matches!(result, Err(SignalError::SessionNotFound(_))));
}

#[tokio::test]
async fn offer_rejects_non_offer_descriptions() {
    let h = harness();
    let session = h.store.create(None, "hi-IN", "meera").await;
    let (tx, _rx) = mpsc::channel(8);
    let bad = SessionDescription {
        sdp_type: "answer".to_string(),
        sdp: "v=0\r\n".to_string(),
    };
    let result = h.manager.handle_offer(&session.session_id, bad, tx).await;
    assert!(matches!(result, Err(SignalError::InvalidOffer(_))));
}

#[tokio::test]
async fn offer_yields_answer_and_tracks_connection() {
    let h = harness();
    let session = h.store.create(None, "hi-IN", "meera").await;
    let (tx, _rx) = mpsc::channel(8);

    let answer = h
        .manager
        .handle_offer(&session.session_id, offer(), tx)
        .await
        .unwrap();
    assert_eq!(answer.sdp_type, "answer");
    assert!(answer.sdp.contains("a=setup:passive"));

    assert_eq!(h.manager.active_connections().await, 1);
    assert_eq!(
        h.manager.connection_state(&session.session_id).await,
        Some(ConnectionState::Negotiating)
    );

    let (local, remote) = h.manager.descriptions(&session.session_id).await.unwrap();
    assert_eq!(local, answer);
    assert_eq!(remote, offer());
}

#[tokio::test]
async fn second_offer_replaces_first_connection() {
    let h = harness();
    let session = h.store.create(None, "hi-IN", "meera").await;
    let (tx1, _rx1) = mpsc::channel(8);
    let (tx2, _rx2) = mpsc::channel(8);

    h.manager
        .handle_offer(&session.session_id, offer(), tx1)
        .await
        .unwrap();
    let first_sender = h
        .manager
        .transport_sender(&session.session_id)
        .await
        .unwrap();

    h.manager
        .handle_offer(&session.session_id, offer(), tx2)
        .await
        .unwrap();
    assert_eq!(h.manager.active_connections().await, 1);

    let second_sender = h
        .manager
        .transport_sender(&session.session_id)
        .await
        .unwrap();
    assert!(!first_sender.same_channel(&second_sender));

    h.manager.close_all().await;
    assert_eq!(h.manager.active_connections().await, 0);
}

#[tokio::test]
async fn unmatched_ice_candidate_is_ignored() {
    let h = harness();
    h.manager
        .handle_ice_candidate(
            "missing",
            IceCandidate {
                candidate: "candidate:0 1 UDP 2122252543 192.0.2.1 54321 typ host".to_string(),
                sdp_mid: Some("0".to_string()),
                sdp_mline_index: Some(0),
            },
        )
        .await;
    // No error surfaced; nothing tracked.
    assert_eq!(h.manager.active_connections().await, 0);
}

#[tokio::test]
async fn matched_ice_candidate_is_recorded() {
    let h = harness();
    let session = h.store.create(None, "hi-IN", "meera").await;
    let (tx, _rx) = mpsc::channel(8);
    h.manager
        .handle_offer(&session.session_id, offer(), tx)
        .await
        .unwrap();

    h.manager
        .handle_ice_candidate(
            &session.session_id,
            IceCandidate {
                candidate: "candidate:0 1 UDP 2122252543 192.0.2.1 54321 typ host".to_string(),
                sdp_mid: Some("0".to_string()),
                sdp_mline_index: Some(0),
            },
        )
        .await;
    assert_eq!(h.manager.candidate_count(&session.session_id).await, Some(1));

    // Empty candidate strings are dropped.
    h.manager
        .handle_ice_candidate(
            &session.session_id,
            IceCandidate {
                candidate: "  ".to_string(),
                sdp_mid: None,
                sdp_mline_index: None,
            },
        )
        .await;
    assert_eq!(h.manager.candidate_count(&session.session_id).await, Some(1));
}

#[tokio::test]
async fn frames_below_threshold_do_not_trigger_a_turn() {
    let h = harness();
    let session = h.store.create(None, "hi-IN", "meera").await;
    let (tx, _rx) = mpsc::channel(64);
    h.manager
        .handle_offer(&session.session_id, offer(), tx)
        .await
        .unwrap();

    for i in 0..FRAME_THRESHOLD - 1 {
        h.manager
            .push_frame(&session.session_id, vec![i as u8; 4])
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.transcription.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn threshold_frame_triggers_one_turn_with_concatenated_audio() {
    let h = harness();
    let session = h.store.create(None, "hi-IN", "meera").await;
    let (tx, mut rx) = mpsc::channel(64);
    h.manager
        .handle_offer(&session.session_id, offer(), tx)
        .await
        .unwrap();

    let mut expected = Vec::new();
    for i in 0..FRAME_THRESHOLD {
        let frame = vec![i as u8; 4];
        expected.extend_from_slice(&frame);
        h.manager
            .push_frame(&session.session_id, frame)
            .await
            .unwrap();
    }

    let transcription = h.transcription.clone();
    wait_for(|| transcription.calls.load(Ordering::SeqCst) == 1).await;
    assert_eq!(*h.transcription.last_audio.lock().unwrap(), expected);

    // Reply text first, then the synthesized audio.
    let first = rx.recv().await.unwrap();
    assert_eq!(first, OutboundFrame::Text("hi, how can I help?".to_string()));
    let second = rx.recv().await.unwrap();
    assert!(matches!(second, OutboundFrame::Audio(_)));

    // No second turn from the same batch.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.transcription.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_state_tears_the_connection_down() {
    let h = harness();
    let session = h.store.create(None, "hi-IN", "meera").await;
    let (tx, _rx) = mpsc::channel(8);
    h.manager
        .handle_offer(&session.session_id, offer(), tx)
        .await
        .unwrap();

    let sender = h
        .manager
        .transport_sender(&session.session_id)
        .await
        .unwrap();
    sender
        .send(TransportEvent::StateChanged(ConnectionState::Failed))
        .await
        .unwrap();

    let manager = &h.manager;
    for _ in 0..100 {
        if manager.active_connections().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("failed connection was not reclaimed");
}

#[tokio::test]
async fn close_ends_the_consumer_even_when_its_channel_is_full() {
    let store = Arc::new(SessionStore::default());
    let started = Arc::new(Notify::new());
    let gate = Arc::new(Semaphore::new(0));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::clone(&store),
        Arc::new(GatedTranscription {
            started: Arc::clone(&started),
            gate: Arc::clone(&gate),
        }),
        Arc::new(StaticReasoning),
        Arc::new(StaticSynthesis),
    ));
    let manager = ConnectionManager::new(orchestrator);

    let session = store.create(None, "hi-IN", "meera").await;
    let (outbound_tx, mut outbound_rx) = mpsc::channel(1024);
    manager
        .handle_offer(&session.session_id, offer(), outbound_tx)
        .await
        .unwrap();

    let sender = manager
        .transport_sender(&session.session_id)
        .await
        .unwrap();
    for _ in 0..FRAME_THRESHOLD {
        sender.send(TransportEvent::Frame(vec![1])).await.unwrap();
    }
    // The consumer is now parked inside a turn and not receiving.
    started.notified().await;

    // Saturate the event channel so no teardown event can be queued.
    while sender.try_send(TransportEvent::Frame(vec![1])).is_ok() {}

    assert!(manager.close(&session.session_id).await);
    drop(sender);
    gate.add_permits(10_000);

    // The consumer drains the backlog and must then exit because every
    // sender is gone, dropping its outbound side.
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while outbound_rx.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok(), "consumer task did not shut down after close");
}

#[tokio::test]
async fn close_is_idempotent() {
    let h = harness();
    let session = h.store.create(None, "hi-IN", "meera").await;
    let (tx, _rx) = mpsc::channel(8);
    h.manager
        .handle_offer(&session.session_id, offer(), tx)
        .await
        .unwrap();

    assert!(h.manager.close(&session.session_id).await);
    assert!(!h.manager.close(&session.session_id).await);
    assert_eq!(h.manager.active_connections().await, 0);
}
