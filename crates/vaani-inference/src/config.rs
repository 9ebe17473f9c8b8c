use serde::Deserialize;
use std::fmt;
use std::time::Duration;

fn default_timeout_secs() -> u64 {
    30
}

/// Endpoints and credentials for the external inference services.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Speech-to-text endpoint URL.
    pub transcription_url: String,
    /// Language-model endpoint URL.
    pub reasoning_url: String,
    /// Text-to-speech endpoint URL.
    pub synthesis_url: String,
    /// API key for the speech services (STT and TTS).
    #[serde(default)]
    pub speech_api_key: String,
    /// API key for the reasoning service.
    #[serde(default)]
    pub reasoning_api_key: String,
    /// Per-call timeout in seconds. Default: 30.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl InferenceConfig {
    /// Per-call timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            transcription_url: String::new(),
            reasoning_url: String::new(),
            synthesis_url: String::new(),
            speech_api_key: String::new(),
            reasoning_api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("transcription_url", &self.transcription_url)
            .field("reasoning_url", &self.reasoning_url)
            .field("synthesis_url", &self.synthesis_url)
            .field("speech_api_key", &"[REDACTED]")
            .field("reasoning_api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
