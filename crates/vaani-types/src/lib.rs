//! Shared types and constants for the Vaani voice assistant.
//!
//! This crate provides the foundational types used across all Vaani crates:
//! conversation roles, history entries, the tagged session-context value,
//! session snapshots, and the language/voice catalog.
//!
//! No crate in the workspace depends on anything *except* `vaani-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod catalog;
mod context;

pub use context::{ContextValue, DocumentRef, KEY_DETECTION_RESULTS, KEY_DOCUMENTS};

/// Who produced a conversation turn.
///
/// External role strings (from clients or reasoning backends) are normalized
/// to this two-value axis at the boundary; anything unrecognized is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The assistant side of the conversation.
    Assistant,
}

impl Role {
    /// Returns the canonical string label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a foreign role string cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized conversation role: {0:?}")]
pub struct ParseRoleError(pub String);

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    /// Normalizes a foreign role string onto the user/assistant axis.
    ///
    /// Reasoning backends use "model" for assistant turns; some clients send
    /// "human" or "bot". Everything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Ok(Self::User),
            "assistant" | "model" | "bot" => Ok(Self::Assistant),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// One entry in a session's conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who produced this turn.
    pub role: Role,
    /// The text content of the turn.
    pub content: String,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Creates an entry timestamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A point-in-time view of a session, as returned over the API.
///
/// History and context are copies; mutating a snapshot never affects the
/// stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Opaque unique session identifier (UUID v4).
    pub session_id: String,
    /// Owning user, if the client identified one.
    pub user_id: Option<String>,
    /// BCP 47 language tag (e.g., "hi-IN").
    pub language: String,
    /// TTS voice selector (e.g., "meera").
    pub voice: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last time the session was read or written.
    pub last_activity: DateTime<Utc>,
    /// Bounded conversation history, oldest first.
    pub conversation_history: Vec<HistoryEntry>,
    /// Per-session context table.
    pub context: HashMap<String, ContextValue>,
}
