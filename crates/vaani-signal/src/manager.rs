//! Peer connection tracking and inbound audio accumulation.

use crate::{
    ConnectionState, IceCandidate, OutboundFrame, SessionDescription, SignalError, TransportEvent,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use vaani_pipeline::{chunk_audio, PipelineOrchestrator, TurnInput, TurnOutcome};

/// Inbound frames buffered before one transcription call is made.
///
/// Batching trades a little latency for fewer, larger transcription requests.
pub const FRAME_THRESHOLD: usize = 10;

/// Capacity of each connection's inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct PeerHandle {
    connection_id: Uuid,
    events_tx: mpsc::Sender<TransportEvent>,
    /// Uses `std::sync::Mutex` intentionally: every acquisition is a brief
    /// read or write that never spans an `.await` point.
    state: Arc<StdMutex<ConnectionState>>,
    remote_description: SessionDescription,
    local_description: SessionDescription,
    candidates: StdMutex<Vec<IceCandidate>>,
}

/// Tracks at most one peer connection per session and feeds accumulated
/// audio into the pipeline.
///
/// The transport layer posts [`TransportEvent`]s onto a connection's inbound
/// channel; a per-connection task consumes them sequentially, so buffering
/// and state transitions need no cross-task synchronization of their own.
pub struct ConnectionManager {
    orchestrator: Arc<PipelineOrchestrator>,
    connections: Arc<RwLock<HashMap<String, PeerHandle>>>,
}

impl ConnectionManager {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self {
            orchestrator,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Applies a negotiation offer for a session and returns the answer.
    ///
    /// The session must exist. An existing connection for the same session
    /// is torn down first; at most one connection per session is ever
    /// tracked. Replies for turns completed over this connection flow out
    /// through `outbound`.
    pub async fn handle_offer(
        &self,
        session_id: &str,
        offer: SessionDescription,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Result<SessionDescription, SignalError> {
        if !offer.is_offer() {
            return Err(SignalError::InvalidOffer(format!(
                "expected type \"offer\", got {:?}",
                offer.sdp_type
            )));
        }
        if offer.sdp.trim().is_empty() {
            return Err(SignalError::InvalidOffer("empty sdp".to_string()));
        }
        self.orchestrator
            .store()
            .get(session_id)
            .await
            .map_err(|_| SignalError::SessionNotFound(session_id.to_string()))?;

        if self.close(session_id).await {
            tracing::info!(session_id, "replaced existing peer connection");
        }

        let answer = offer.answer();
        let connection_id = Uuid::new_v4();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let state = Arc::new(StdMutex::new(ConnectionState::Negotiating));

        tokio::spawn(run_connection(
            session_id.to_string(),
            connection_id,
            events_rx,
            outbound,
            Arc::clone(&self.orchestrator),
            Arc::clone(&state),
            Arc::clone(&self.connections),
        ));

        self.connections.write().await.insert(
            session_id.to_string(),
            PeerHandle {
                connection_id,
                events_tx,
                state,
                remote_description: offer,
                local_description: answer.clone(),
                candidates: StdMutex::new(Vec::new()),
            },
        );

        tracing::info!(session_id, "negotiated peer connection");
        Ok(answer)
    }

    /// Records a trickled ICE candidate for a session's connection.
    ///
    /// Candidates may race ahead of or behind offer/answer completion, so an
    /// unmatched candidate is logged and ignored, never an error.
    pub async fn handle_ice_candidate(&self, session_id: &str, candidate: IceCandidate) {
        let connections = self.connections.read().await;
        match connections.get(session_id) {
            Some(handle) if !candidate.candidate.trim().is_empty() => {
                tracing::debug!(session_id, candidate = %candidate.candidate, "applied ice candidate");
                handle.candidates.lock().unwrap_or_else(|e| e.into_inner()).push(candidate);
            }
            Some(_) => {
                tracing::debug!(session_id, "ignoring empty ice candidate");
            }
            None => {
                tracing::debug!(session_id, "no connection for ice candidate, ignoring");
            }
        }
    }

    /// Posts one inbound audio frame onto the session's connection.
    pub async fn push_frame(&self, session_id: &str, frame: Vec<u8>) -> Result<(), SignalError> {
        let sender = self.transport_sender(session_id).await;
        match sender {
            Some(tx) => tx
                .send(TransportEvent::Frame(frame))
                .await
                .map_err(|_| SignalError::NoConnection(session_id.to_string())),
            None => Err(SignalError::NoConnection(session_id.to_string())),
        }
    }

    /// A sender the transport layer can use to post events for a session.
    pub async fn transport_sender(
        &self,
        session_id: &str,
    ) -> Option<mpsc::Sender<TransportEvent>> {
        self.connections
            .read()
            .await
            .get(session_id)
            .map(|handle| handle.events_tx.clone())
    }

    /// Number of ICE candidates recorded for a session's connection.
    pub async fn candidate_count(&self, session_id: &str) -> Option<usize> {
        self.connections.read().await.get(session_id).map(|handle| {
            handle
                .candidates
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .len()
        })
    }

    /// The current state of a session's connection, if one is tracked.
    pub async fn connection_state(&self, session_id: &str) -> Option<ConnectionState> {
        self.connections
            .read()
            .await
            .get(session_id)
            .map(|handle| *handle.state.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// The local and remote descriptions negotiated for a session.
    pub async fn descriptions(
        &self,
        session_id: &str,
    ) -> Option<(SessionDescription, SessionDescription)> {
        self.connections.read().await.get(session_id).map(|handle| {
            (
                handle.local_description.clone(),
                handle.remote_description.clone(),
            )
        })
    }

    /// Closes a session's connection and forgets it. Idempotent; returns
    /// whether a connection was actually removed.
    pub async fn close(&self, session_id: &str) -> bool {
        let removed = self.connections.write().await.remove(session_id);
        match removed {
            Some(handle) => {
                teardown(session_id, &handle);
                true
            }
            None => false,
        }
    }

    /// Closes every tracked connection. Used at process shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<(String, PeerHandle)> =
            self.connections.write().await.drain().collect();
        for (session_id, handle) in &drained {
            teardown(session_id, handle);
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "closed all peer connections");
        }
    }

    /// Number of currently tracked connections.
    pub async fn active_connections(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn teardown(session_id: &str, handle: &PeerHandle) {
    {
        let mut state = handle.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.is_terminal() {
            *state = ConnectionState::Closed;
        }
    }
    // Best effort: the consumer task exits on this event, or when the last
    // sender clone is dropped.
    let _ = handle.events_tx.try_send(TransportEvent::Closed);
    tracing::info!(session_id, "peer connection closed");
}

/// Per-connection event loop: accumulates frames, hands full batches to the
/// pipeline, and tears the connection down on terminal state changes.
///
/// This task holds no sender for its own event channel, so it also exits
/// when the handle's sender (and every transport clone) is dropped, even if
/// the teardown event never made it onto a full channel.
async fn run_connection(
    session_id: String,
    connection_id: Uuid,
    mut events_rx: mpsc::Receiver<TransportEvent>,
    outbound: mpsc::Sender<OutboundFrame>,
    orchestrator: Arc<PipelineOrchestrator>,
    state: Arc<StdMutex<ConnectionState>>,
    connections: Arc<RwLock<HashMap<String, PeerHandle>>>,
) {
    let mut buffer: Vec<Vec<u8>> = Vec::with_capacity(FRAME_THRESHOLD);

    while let Some(event) = events_rx.recv().await {
        match event {
            TransportEvent::Frame(frame) => {
                buffer.push(frame);
                if buffer.len() < FRAME_THRESHOLD {
                    continue;
                }
                let audio = buffer.concat();
                buffer.clear();
                if !run_audio_turn(&session_id, audio, &orchestrator, &outbound).await {
                    break;
                }
            }
            TransportEvent::StateChanged(new_state) => {
                tracing::debug!(session_id, state = ?new_state, "connection state changed");
                *state.lock().unwrap_or_else(|e| e.into_inner()) = new_state;
                if new_state == ConnectionState::Failed {
                    tracing::warn!(session_id, "peer connection failed, tearing down");
                    break;
                }
                if new_state == ConnectionState::Closed {
                    break;
                }
            }
            TransportEvent::Closed => break,
        }
    }

    {
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.is_terminal() {
            *state = ConnectionState::Closed;
        }
    }

    // Remove our own entry unless a replacement connection already took the
    // slot.
    let mut connections = connections.write().await;
    if let Some(handle) = connections.get(&session_id) {
        if handle.connection_id == connection_id {
            connections.remove(&session_id);
        }
    }
}

/// Runs one accumulated audio batch through the pipeline and forwards the
/// reply. Returns false when the outbound side is gone and the connection
/// should shut down.
async fn run_audio_turn(
    session_id: &str,
    audio: Vec<u8>,
    orchestrator: &PipelineOrchestrator,
    outbound: &mpsc::Sender<OutboundFrame>,
) -> bool {
    match orchestrator.run_turn(session_id, TurnInput::Audio(audio)).await {
        Ok(TurnOutcome::Reply(output)) => {
            if outbound
                .send(OutboundFrame::Text(output.text.clone()))
                .await
                .is_err()
            {
                return false;
            }
            for chunk in chunk_audio(&output.audio) {
                if outbound
                    .send(OutboundFrame::Audio(chunk.to_vec()))
                    .await
                    .is_err()
                {
                    return false;
                }
            }
            true
        }
        Ok(TurnOutcome::NoSpeech) => {
            tracing::debug!(session_id, "no speech in accumulated audio batch");
            true
        }
        Err(e) => {
            // The turn failed upstream; keep the connection alive so the
            // client can retry.
            tracing::warn!(session_id, error = %e, "audio turn failed");
            true
        }
    }
}
