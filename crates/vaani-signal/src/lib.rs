//! Peer-connection signaling for the Vaani voice pipeline.
//!
//! Negotiates transport descriptions per session, accumulates inbound audio
//! frames into batches large enough to transcribe, and tracks connection
//! health so failed transports are reclaimed. One connection per session;
//! a new offer displaces the old connection.

mod error;
mod manager;
mod types;

#[cfg(test)]
mod tests;

pub use error::SignalError;
pub use manager::{ConnectionManager, FRAME_THRESHOLD};
pub use types::{
    ConnectionState, IceCandidate, OutboundFrame, SessionDescription, TransportEvent,
};
