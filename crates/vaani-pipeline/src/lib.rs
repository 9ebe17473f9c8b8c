//! Turn orchestration for the Vaani voice pipeline.
//!
//! One conversational turn flows audio-or-text in, through transcription
//! (audio only), prompt enrichment from session context, language-model
//! reasoning over a bounded history window, and speech synthesis back out.
//!
//! Failure policy: transcription and reasoning failures abort the turn
//! without touching the conversation history; synthesis failures degrade to
//! a text-only reply, first attempting a fixed spoken error message. Text is
//! never lost because audio generation failed.
//!
//! Turns for the same session are serialized by a per-session lock so
//! concurrent submissions cannot interleave history appends.

mod error;
pub mod prompt;


pub use error::PipelineError;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use vaani_inference::{ReasoningPort, ReasoningTurn, SynthesisPort, TranscriptionPort};
use vaani_session::SessionStore;
use vaani_types::{Role, SessionSnapshot};

/// History window passed to the reasoning port: last 5 exchanges.
pub const HISTORY_WINDOW_EXCHANGES: usize = 5;

/// Chunk size for streaming synthesized audio to a transport.
pub const AUDIO_CHUNK_BYTES: usize = 4096;

/// Spoken when synthesis of the real reply fails.
pub const SPOKEN_ERROR_MESSAGE: &str =
    "I'm sorry, I encountered an error processing your request.";

/// Input to one conversational turn.
#[derive(Debug, Clone)]
pub enum TurnInput {
    /// The user typed or sent text directly; transcription is skipped.
    Text(String),
    /// Raw audio to transcribe in the session's language.
    Audio(Vec<u8>),
}

/// A completed reply: response text plus synthesized audio (possibly empty
/// when synthesis degraded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutput {
    pub text: String,
    pub audio: Vec<u8>,
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant produced a reply.
    Reply(TurnOutput),
    /// Transcription produced no usable speech; nothing was generated and
    /// history is unchanged.
    NoSpeech,
}

/// Immutable per-turn configuration, derived fresh from the session's
/// current attributes. Not persisted.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub language: String,
    pub voice: String,
    pub history_window: usize,
    pub system_instruction: &'static str,
}

impl PipelineConfig {
    fn for_turn(session: &SessionSnapshot) -> Self {
        Self {
            language: session.language.clone(),
            voice: session.voice.clone(),
            history_window: HISTORY_WINDOW_EXCHANGES * 2,
            system_instruction: prompt::select_system_instruction(&session.context),
        }
    }
}

/// Sequences one conversational turn against the session store and the three
/// inference ports.
pub struct PipelineOrchestrator {
    store: Arc<SessionStore>,
    transcription: Arc<dyn TranscriptionPort>,
    reasoning: Arc<dyn ReasoningPort>,
    synthesis: Arc<dyn SynthesisPort>,
    /// Per-session turn locks; an entry is pruned when its session is gone.
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PipelineOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        transcription: Arc<dyn TranscriptionPort>,
        reasoning: Arc<dyn ReasoningPort>,
        synthesis: Arc<dyn SynthesisPort>,
    ) -> Self {
        Self {
            store,
            transcription,
            reasoning,
            synthesis,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The session store this orchestrator reads and writes.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    async fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drops the map entry once no other task is waiting on this lock, so
    /// the lock table does not accumulate an entry per session ever seen.
    async fn release_turn_lock(&self, session_id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.turn_locks.lock().await;
        if let Some(entry) = locks.get(session_id) {
            // Two strong refs mean the map's clone and ours; any more and a
            // concurrent turn is queued behind this lock.
            if Arc::ptr_eq(entry, lock) && Arc::strong_count(entry) == 2 {
                locks.remove(session_id);
            }
        }
    }

    /// Runs one conversational turn for a session.
    ///
    /// Turns for the same session are serialized; distinct sessions run
    /// concurrently.
    pub async fn run_turn(
        &self,
        session_id: &str,
        input: TurnInput,
    ) -> Result<TurnOutcome, PipelineError> {
        let lock = self.turn_lock(session_id).await;
        let guard = lock.lock().await;
        let result = self.run_turn_locked(session_id, input).await;
        drop(guard);
        self.release_turn_lock(session_id, &lock).await;
        result
    }

    async fn run_turn_locked(
        &self,
        session_id: &str,
        input: TurnInput,
    ) -> Result<TurnOutcome, PipelineError> {
        let session = self
            .store
            .get(session_id)
            .await
            .map_err(|_| PipelineError::SessionNotFound(session_id.to_string()))?;
        let config = PipelineConfig::for_turn(&session);

        // Step 1: obtain the raw input text, transcribing audio if needed.
        let raw_text = match input {
            TurnInput::Text(text) => text,
            TurnInput::Audio(audio) => {
                let text = self
                    .transcription
                    .transcribe(&audio, &config.language)
                    .await
                    .map_err(|e| PipelineError::Transcription(e.to_string()))?;
                if text.trim().is_empty() {
                    tracing::info!(session_id, "no speech detected in audio turn");
                    return Ok(TurnOutcome::NoSpeech);
                }
                text
            }
        };

        // Step 2: enrich the prompt from session context and gather history.
        let enriched_prompt = prompt::build_prompt(&raw_text, &session.context);
        let history: Vec<ReasoningTurn> = self
            .store
            .get_history(session_id, Some(config.history_window))
            .await
            .into_iter()
            .map(|entry| ReasoningTurn::new(entry.role, entry.content))
            .collect();

        // Step 3: reasoning. A failure here aborts before any history append,
        // so a partial turn never pollutes the conversational record.
        let response_text = self
            .reasoning
            .generate(&enriched_prompt, &history, config.system_instruction)
            .await
            .map_err(|e| PipelineError::Reasoning(e.to_string()))?;

        // Step 4: record the completed exchange, raw input first.
        self.store
            .append_history(session_id, Role::User, raw_text)
            .await
            .map_err(|_| PipelineError::SessionNotFound(session_id.to_string()))?;
        self.store
            .append_history(session_id, Role::Assistant, response_text.clone())
            .await
            .map_err(|_| PipelineError::SessionNotFound(session_id.to_string()))?;

        // Step 5: synthesis, with graceful degradation.
        let audio = self
            .synthesize_with_fallback(&response_text, &config)
            .await;

        tracing::info!(
            session_id,
            response_len = response_text.len(),
            audio_bytes = audio.len(),
            "completed pipeline turn"
        );

        Ok(TurnOutcome::Reply(TurnOutput {
            text: response_text,
            audio,
        }))
    }

    /// Synthesizes the reply, falling back to a fixed spoken error message,
    /// then to no audio at all. Never fails the turn.
    async fn synthesize_with_fallback(&self, text: &str, config: &PipelineConfig) -> Vec<u8> {
        match self
            .synthesis
            .synthesize(text, &config.language, &config.voice)
            .await
        {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed, attempting spoken error message");
                match self
                    .synthesis
                    .synthesize(SPOKEN_ERROR_MESSAGE, &config.language, &config.voice)
                    .await
                {
                    Ok(audio) => audio,
                    Err(e) => {
                        tracing::warn!(error = %e, "fallback synthesis failed, returning text only");
                        Vec::new()
                    }
                }
            }
        }
    }
}

/// Splits an already-synthesized audio buffer into fixed-size chunks for
/// streaming playback. A pure post-processing split; no additional synthesis.
pub fn chunk_audio(audio: &[u8]) -> impl Iterator<Item = &[u8]> {
    audio.chunks(AUDIO_CHUNK_BYTES)
}
