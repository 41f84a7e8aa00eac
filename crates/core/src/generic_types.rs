use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool as advertised to a model provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments, or `None` for a tool that takes none.
    pub parameters: Option<Value>,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Provider-assigned id echoed back with the result.
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Generic events that any real-time model provider can emit back to the application.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// The model wants a tool run.
    ToolCall(ToolCallRequest),
    /// The model withdrew earlier tool calls (ids). In-flight handlers still finish.
    ToolCallCancelled(Vec<String>),
    /// A chunk of spoken audio from the AI (base64 PCM16, 24 kHz).
    AudioChunk(String),
    /// The AI finished its turn.
    TurnComplete,
    /// The user barged in over the AI.
    Interrupted,
    /// A non-fatal error from the provider.
    Error(String),
    /// The connection was closed.
    Closed,
}
