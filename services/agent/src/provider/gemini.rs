//! Gemini Live model session.
//!
//! Connects through `gemini-realtime`, then runs one task that proxies
//! [`ModelCommand`]s to the socket and server messages back as [`ModelEvent`]s.
//! Peer audio arrives at 24 kHz and is resampled to the 16 kHz Gemini expects.

use super::{ModelCommand, ModelSession, ModelSessionConfig, ModelSessionHandle};
use crate::audio_utils;
use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_realtime::{
    LIVE_ENDPOINT, LiveError, LiveReceiver, LiveSender,
    types::{
        BidiGenerateContentClientContent, BidiGenerateContentRealtimeInput,
        BidiGenerateContentSetup, BidiGenerateContentToolResponse, Blob, ClientMessage, Content,
        FunctionDeclaration, FunctionResponse, GenerationConfig, ResponseModality, ServerMessage,
        SpeechConfig, Tool,
    },
};
use presenter_core::generic_types::{ModelEvent, ToolCallRequest};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, warn};

const RESAMPLER_CHUNK_SIZE: usize = 480;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub endpoint: String,
}

impl GeminiConfig {
    pub fn new(api_key: String, model: String, voice: String) -> Self {
        Self {
            api_key,
            model,
            voice,
            endpoint: LIVE_ENDPOINT.to_string(),
        }
    }
}

pub struct GeminiLive {
    config: GeminiConfig,
}

impl GeminiLive {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }

    fn setup(&self, session: ModelSessionConfig) -> BidiGenerateContentSetup {
        let function_declarations: Vec<FunctionDeclaration> = session
            .tools
            .into_iter()
            .map(|t| FunctionDeclaration {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            })
            .collect();

        BidiGenerateContentSetup {
            model: self.config.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                speech_config: Some(SpeechConfig::prebuilt(&self.config.voice)),
            },
            system_instruction: Some(Content::text(None, session.instructions)),
            tools: if function_declarations.is_empty() {
                Vec::new()
            } else {
                vec![Tool {
                    function_declarations,
                }]
            },
        }
    }
}

#[async_trait]
impl ModelSession for GeminiLive {
    async fn start(&self, session: ModelSessionConfig) -> Result<ModelSessionHandle> {
        let setup = self.setup(session);
        let (sender, receiver) =
            gemini_realtime::connect_to(&self.config.endpoint, &self.config.api_key, setup)
                .await
                .context("Failed to open the Gemini Live session")?;

        let resampler = audio_utils::StreamResampler::new(
            audio_utils::PEER_AUDIO_SAMPLE_RATE,
            audio_utils::GEMINI_LIVE_API_PCM16_SAMPLE_RATE,
            RESAMPLER_CHUNK_SIZE,
        )?;

        let (commands_tx, commands_rx) = mpsc::channel(128);
        let (events_tx, events_rx) = mpsc::channel(128);
        let task = tokio::spawn(
            run(sender, receiver, commands_rx, events_tx, resampler).in_current_span(),
        );

        Ok(ModelSessionHandle {
            commands: commands_tx,
            events: events_rx,
            task,
        })
    }
}

/// Proxies until either side closes. Always ends with [`ModelEvent::Closed`].
async fn run(
    mut sender: LiveSender,
    mut receiver: LiveReceiver,
    mut commands: mpsc::Receiver<ModelCommand>,
    events: mpsc::Sender<ModelEvent>,
    mut resampler: audio_utils::StreamResampler,
) {
    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    info!("Model session released; closing Gemini connection.");
                    let _ = sender.close().await;
                    break;
                };
                let Some(msg) = to_client_message(command, &mut resampler) else {
                    continue;
                };
                if let Err(e) = sender.send(&msg).await {
                    error!(error = %e, "Failed to send to Gemini");
                    break;
                }
            },
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(msg)) => {
                        for event in to_model_events(msg) {
                            if events.send(event).await.is_err() {
                                debug!("Model event receiver dropped");
                            }
                        }
                    }
                    Some(Err(LiveError::Json(e))) => {
                        warn!(error = %e, "Ignoring unparseable Gemini message");
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Gemini connection failed");
                        let _ = events.send(ModelEvent::Error(e.to_string())).await;
                        break;
                    }
                    None => {
                        info!("Gemini connection ended.");
                        break;
                    }
                }
            },
        }
    }
    let _ = events.send(ModelEvent::Closed).await;
}

fn to_client_message(
    command: ModelCommand,
    resampler: &mut audio_utils::StreamResampler,
) -> Option<ClientMessage> {
    match command {
        ModelCommand::Audio(data) => {
            let pcm = audio_utils::convert_i16_to_f32(&audio_utils::decode_i16(&data));
            let resampled = resampler.process(&pcm);
            if resampled.is_empty() {
                return None;
            }
            Some(ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
                audio: Some(Blob {
                    mime_type: "audio/pcm;rate=16000".to_string(),
                    data: audio_utils::encode_f32_to_base64_i16(&resampled),
                }),
                ..Default::default()
            }))
        }
        ModelCommand::VideoFrame { mime_type, data } => {
            Some(ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
                video: Some(Blob { mime_type, data }),
                ..Default::default()
            }))
        }
        ModelCommand::GenerateReply { instructions } => Some(ClientMessage::ClientContent(
            BidiGenerateContentClientContent {
                turns: vec![Content::text(Some("user"), instructions)],
                turn_complete: true,
            },
        )),
        ModelCommand::ToolResult {
            call_id,
            name,
            output,
            is_error,
        } => {
            let response = if is_error {
                json!({ "error": output })
            } else {
                json!({ "output": output })
            };
            Some(ClientMessage::ToolResponse(BidiGenerateContentToolResponse {
                function_responses: vec![FunctionResponse {
                    id: call_id,
                    name,
                    response,
                }],
            }))
        }
    }
}

fn to_model_events(msg: ServerMessage) -> Vec<ModelEvent> {
    let mut events = Vec::new();

    if let Some(content) = msg.server_content {
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(blob) = part.inline_data {
                    events.push(ModelEvent::AudioChunk(blob.data));
                } else if let Some(text) = part.text {
                    debug!(%text, "Model text part");
                }
            }
        }
        if content.interrupted == Some(true) {
            events.push(ModelEvent::Interrupted);
        }
        if content.turn_complete == Some(true) {
            events.push(ModelEvent::TurnComplete);
        }
    }

    if let Some(tool_call) = msg.tool_call {
        events.extend(tool_call.function_calls.into_iter().map(|call| {
            ModelEvent::ToolCall(ToolCallRequest {
                call_id: call.id,
                tool_name: call.name,
                arguments: call.args,
            })
        }));
    }

    if let Some(cancellation) = msg.tool_call_cancellation {
        events.push(ModelEvent::ToolCallCancelled(cancellation.ids));
    }

    if msg.go_away.is_some() {
        warn!("Gemini announced it will close the connection soon");
    }

    events
}
