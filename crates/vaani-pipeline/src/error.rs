//! Error types for pipeline turns.

/// Failures that abort a conversational turn.
///
/// Synthesis failures are deliberately absent: they degrade the turn to a
/// text-only reply instead of failing it.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The session does not exist or has expired.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Speech-to-text failed; the turn is aborted with history untouched.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Language-model reasoning failed; the turn is aborted with history
    /// untouched.
    #[error("reasoning failed: {0}")]
    Reasoning(String),
}
