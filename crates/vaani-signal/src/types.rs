use serde::{Deserialize, Serialize};

/// An SDP session description as exchanged during negotiation.
///
/// The media transport itself lives outside this crate; signaling only needs
/// to carry the description between peers and derive an answer from an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// `"offer"` or `"answer"`.
    #[serde(rename = "type")]
    pub sdp_type: String,
    pub sdp: String,
}

impl SessionDescription {
    pub fn is_offer(&self) -> bool {
        self.sdp_type == "offer"
    }

    /// Derives the answering description for this offer.
    ///
    /// The media sections are mirrored back; the DTLS setup role is flipped
    /// to passive since the answering side waits for the client to connect.
    pub fn answer(&self) -> SessionDescription {
        SessionDescription {
            sdp_type: "answer".to_string(),
            sdp: self.sdp.replace("a=setup:actpass", "a=setup:passive"),
        }
    }
}

/// A trickled ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

/// Lifecycle of one peer connection.
///
/// `Failed` and `Closed` are terminal; reaching `Failed` triggers the same
/// teardown as an explicit close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Negotiating,
    Connected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

/// Typed events the transport layer posts onto a connection's inbound
/// channel. Each connection's events are consumed by a single task, so the
/// state machine never has to reason about reentrant callbacks.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// One inbound audio frame from the connection's media track.
    Frame(Vec<u8>),
    /// The underlying transport changed state.
    StateChanged(ConnectionState),
    /// The remote side closed the transport.
    Closed,
}

/// Messages flowing back to the client over the connection's outbound side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// The assistant's reply text for a completed turn.
    Text(String),
    /// One chunk of synthesized reply audio.
    Audio(Vec<u8>),
}
