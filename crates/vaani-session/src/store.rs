use crate::SessionError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;
use vaani_types::{ContextValue, HistoryEntry, Role, SessionSnapshot};

/// Fixed idle TTL after which an untouched session expires (10 minutes).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(600);

/// Maximum conversation history entries kept per session.
pub const DEFAULT_HISTORY_BOUND: usize = 10;

/// Mutable state of one session, guarded by its own mutex.
struct SessionState {
    session_id: String,
    user_id: Option<String>,
    language: String,
    voice: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    last_touched: Instant,
    history: Vec<HistoryEntry>,
    context: HashMap<String, ContextValue>,
}

impl SessionState {
    fn touch(&mut self) {
        self.last_activity = Utc::now();
        self.last_touched = Instant::now();
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            language: self.language.clone(),
            voice: self.voice.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            conversation_history: self.history.clone(),
            context: self.context.clone(),
        }
    }
}

/// Partial session update; `None` fields are left unchanged.
#[derive(Debug, Default, Clone)]
pub struct SessionUpdate {
    pub user_id: Option<String>,
    pub language: Option<String>,
    pub voice: Option<String>,
}

/// Keyed, expiring container for conversation state.
///
/// All operations are async-safe for concurrent access by multiple turns and
/// connections. Identifiers are UUID v4, so an id is never reused after
/// deletion within a process lifetime.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    ttl: Duration,
    history_bound: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL, DEFAULT_HISTORY_BOUND)
    }
}

impl SessionStore {
    /// Creates a store with the given idle TTL and history bound.
    pub fn new(ttl: Duration, history_bound: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            history_bound,
        }
    }

    /// Allocates a fresh session and returns its initial snapshot.
    pub async fn create(
        &self,
        user_id: Option<String>,
        language: impl Into<String>,
        voice: impl Into<String>,
    ) -> SessionSnapshot {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let state = SessionState {
            session_id: session_id.clone(),
            user_id,
            language: language.into(),
            voice: voice.into(),
            created_at: now,
            last_activity: now,
            last_touched: Instant::now(),
            history: Vec::new(),
            context: HashMap::new(),
        };
        let snapshot = state.snapshot();

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::new(Mutex::new(state)));

        tracing::info!(session_id = %session_id, "created session");
        snapshot
    }

    /// Resolves a live session entry, removing it if the idle TTL has lapsed.
    async fn entry(&self, session_id: &str) -> Result<Arc<Mutex<SessionState>>, SessionError> {
        let entry = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()
        };

        let entry = entry.ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let expired = {
            let state = entry.lock().await;
            state.last_touched.elapsed() > self.ttl
        };

        if expired {
            // Lazy reclamation: an expired session behaves as deleted.
            let mut sessions = self.sessions.write().await;
            if let Some(current) = sessions.get(session_id) {
                if Arc::ptr_eq(current, &entry) {
                    sessions.remove(session_id);
                }
            }
            tracing::info!(session_id = %session_id, "session expired");
            return Err(SessionError::NotFound(session_id.to_string()));
        }

        Ok(entry)
    }

    /// Returns the current session snapshot and refreshes its expiry.
    pub async fn get(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        state.touch();
        Ok(state.snapshot())
    }

    /// Merges partial fields into a session. Refreshes expiry.
    pub async fn update(
        &self,
        session_id: &str,
        update: SessionUpdate,
    ) -> Result<SessionSnapshot, SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        if let Some(user_id) = update.user_id {
            state.user_id = Some(user_id);
        }
        if let Some(language) = update.language {
            state.language = language;
        }
        if let Some(voice) = update.voice {
            state.voice = voice;
        }
        state.touch();
        Ok(state.snapshot())
    }

    /// Appends a history entry, evicting the oldest entry beyond the bound.
    pub async fn append_history(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<(), SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        state.history.push(HistoryEntry::new(role, content));
        if state.history.len() > self.history_bound {
            let excess = state.history.len() - self.history_bound;
            state.history.drain(..excess);
        }
        state.touch();
        Ok(())
    }

    /// Returns the most recent `limit` history entries, oldest first.
    ///
    /// Returns all entries when `limit` is `None`, and an empty sequence when
    /// the session is missing or expired.
    pub async fn get_history(&self, session_id: &str, limit: Option<usize>) -> Vec<HistoryEntry> {
        let Ok(entry) = self.entry(session_id).await else {
            return Vec::new();
        };
        let mut state = entry.lock().await;
        state.touch();
        let history = &state.history;
        let start = match limit {
            Some(n) => history.len().saturating_sub(n),
            None => 0,
        };
        history[start..].to_vec()
    }

    /// Stores a context value under `key`, overwriting any prior value.
    pub async fn set_context(
        &self,
        session_id: &str,
        key: impl Into<String>,
        value: ContextValue,
    ) -> Result<(), SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        let key = key.into();
        state.context.insert(key.clone(), value);
        state.touch();
        tracing::debug!(session_id = %session_id, key = %key, "set session context");
        Ok(())
    }

    /// Returns the context value stored under `key`, if any.
    pub async fn get_context(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<ContextValue>, SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        state.touch();
        Ok(state.context.get(key).cloned())
    }

    /// Returns the whole context table.
    pub async fn context_table(
        &self,
        session_id: &str,
    ) -> Result<HashMap<String, ContextValue>, SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        state.touch();
        Ok(state.context.clone())
    }

    /// Removes a session and everything it owns. Idempotent.
    ///
    /// Returns `false` if the session was already absent.
    pub async fn delete(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            tracing::info!(session_id = %session_id, "deleted session");
        }
        removed
    }

    /// Returns the identifiers of all non-expired sessions. Diagnostics only;
    /// does not refresh expiry.
    pub async fn list_active(&self) -> Vec<String> {
        let entries: Vec<(String, Arc<Mutex<SessionState>>)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
                .collect()
        };

        let mut active = Vec::new();
        for (id, entry) in entries {
            let state = entry.lock().await;
            if state.last_touched.elapsed() <= self.ttl {
                active.push(id);
            }
        }
        active
    }

    /// Removes every expired session and returns how many were reclaimed.
    pub async fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();
        for (id, entry) in sessions.iter() {
            let state = entry.lock().await;
            if state.last_touched.elapsed() > self.ttl {
                expired.push(id.clone());
            }
        }
        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "swept expired sessions");
        }
        expired.len()
    }
}
