//! In-process session store for the Vaani voice assistant.
//!
//! A session is the unit of conversational continuity: it owns a bounded
//! conversation history and a context table, and expires after a fixed idle
//! TTL. Every read or write refreshes the idle timer.
//!
//! Concurrency model: the store map is guarded by an `RwLock`; each session
//! sits behind its own `Mutex`, so mutations on one session never contend
//! with another session's traffic, and a single session's history/context
//! updates are atomic read-modify-writes.
//!
//! Expiry is enforced lazily (an expired session is invisible and removed on
//! access) and, in the server, by a periodic sweep calling
//! [`SessionStore::sweep_expired`].

mod error;
mod store;


pub use error::SessionError;
pub use store::{SessionStore, SessionUpdate, DEFAULT_HISTORY_BOUND, DEFAULT_SESSION_TTL};
