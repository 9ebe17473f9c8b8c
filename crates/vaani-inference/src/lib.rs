//! Inference ports for the Vaani voice pipeline.
//!
//! The pipeline consumes three abstract capabilities: speech-to-text
//! transcription, language-model reasoning, and text-to-speech synthesis.
//! Each is a trait here, with an HTTP implementation that calls an external
//! inference service over JSON with a bounded timeout.
//!
//! The traits are the seam for testing and backend substitution: any service
//! honoring the request/response contract in [`http`] can stand in, and the
//! pipeline crate exercises its error handling against local test doubles.

mod config;
mod error;
pub mod http;
mod ports;

pub use config::InferenceConfig;
pub use error::InferenceError;
pub use http::{HttpReasoning, HttpSynthesis, HttpTranscription};
pub use ports::{ReasoningPort, ReasoningTurn, SynthesisPort, TranscriptionPort};
