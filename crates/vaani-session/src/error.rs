//! Error types for the session store.

/// Errors returned by [`crate::SessionStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session does not exist or has expired.
    #[error("session not found: {0}")]
    NotFound(String),
}
