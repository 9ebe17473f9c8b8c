//! Error taxonomy for the inference ports.

/// Failures reported by the inference ports.
///
/// Transcription and reasoning failures abort a pipeline turn; synthesis
/// failures degrade to a text-only response. Timeouts surface as the same
/// variants — the ports never retry on their own.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// Speech-to-text call failed (network, format, or upstream error).
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Language-model call failed (network, rate limit, or malformed response).
    #[error("reasoning failed: {0}")]
    Reasoning(String),

    /// Text-to-speech call failed.
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}
