//! Defines the WebSocket message protocol between the display surface and the agent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from the peer (browser) to the agent.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// The peer has attached its listeners; control messages may flow.
    Ready,
    /// Heartbeat.
    Ping,
    /// A chunk of microphone audio (base64 PCM16, mono, 24 kHz).
    Audio { data: String },
    /// A screen or camera snapshot (base64).
    VideoFrame { mime_type: String, data: String },
}

/// Everything the agent sends to the peer, tagged by topic.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub payload: Value,
}

/// Peer media handed to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    Audio(String),
    VideoFrame { mime_type: String, data: String },
}
