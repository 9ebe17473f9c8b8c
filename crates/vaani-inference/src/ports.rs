use crate::InferenceError;
use async_trait::async_trait;
use vaani_types::Role;

/// One conversational turn in the shape the reasoning backend expects:
/// alternating user/assistant turns, most recent last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningTurn {
    pub role: Role,
    pub text: String,
}

impl ReasoningTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Speech-to-text capability.
#[async_trait]
pub trait TranscriptionPort: Send + Sync {
    /// Transcribes an audio payload in the given language.
    ///
    /// An empty or whitespace-only result is a valid outcome (no speech
    /// detected); callers decide what to do with it.
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, InferenceError>;
}

/// Language-model reasoning capability.
#[async_trait]
pub trait ReasoningPort: Send + Sync {
    /// Generates a response to `prompt` given prior conversation turns and a
    /// system instruction.
    async fn generate(
        &self,
        prompt: &str,
        history: &[ReasoningTurn],
        system_instruction: &str,
    ) -> Result<String, InferenceError>;
}

/// Text-to-speech capability.
#[async_trait]
pub trait SynthesisPort: Send + Sync {
    /// Synthesizes `text` into audio bytes using the given language and voice.
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
    ) -> Result<Vec<u8>, InferenceError>;
}
