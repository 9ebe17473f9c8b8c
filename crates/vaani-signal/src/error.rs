use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("invalid offer: {0}")]
    InvalidOffer(String),
    #[error("no active connection for session: {0}")]
    NoConnection(String),
}
