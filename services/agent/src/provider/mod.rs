//! Collaborator sessions: the avatar renderer and the real-time model.
//!
//! The orchestrator only sees these traits; `anam` and `gemini` are the
//! hosted implementations.

pub mod anam;
pub mod gemini;

use crate::room::RoomHandle;
use anyhow::Result;
use async_trait::async_trait;
use presenter_core::generic_types::{ModelEvent, ToolDeclaration};
use tokio::{sync::mpsc, task::JoinHandle};

/// Topic the avatar bootstrap and avatar audio travel on.
pub const AVATAR_TOPIC: &str = "avatar";

/// The talking avatar attached to a room.
#[async_trait]
pub trait AvatarSession: Send + Sync {
    /// Returns once the avatar is confirmed attached to `room`.
    async fn start(&self, room: &RoomHandle) -> Result<()>;
    /// Forwards model speech (base64 PCM16, 24 kHz) for lip-synced playback.
    async fn push_audio(&self, room: &RoomHandle, data: String) -> Result<()>;
    async fn stop(&self, room: &RoomHandle);
}

/// What the model session is configured with at start.
#[derive(Debug, Clone)]
pub struct ModelSessionConfig {
    pub instructions: String,
    pub tools: Vec<ToolDeclaration>,
}

/// Instructions sent into a running model session.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCommand {
    /// Microphone audio from the peer (base64 PCM16, 24 kHz).
    Audio(String),
    VideoFrame { mime_type: String, data: String },
    /// Ask the model to speak now, following `instructions`.
    GenerateReply { instructions: String },
    ToolResult {
        call_id: String,
        name: String,
        output: String,
        is_error: bool,
    },
}

/// A running model session. Dropping `commands` ends it.
pub struct ModelSessionHandle {
    pub commands: mpsc::Sender<ModelCommand>,
    pub events: mpsc::Receiver<ModelEvent>,
    pub task: JoinHandle<()>,
}

#[async_trait]
pub trait ModelSession: Send + Sync {
    async fn start(&self, config: ModelSessionConfig) -> Result<ModelSessionHandle>;
}
