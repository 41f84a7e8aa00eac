//! Session Orchestrator
//!
//! Owns one presentation session from the peer's `ready` to teardown:
//!
//! 1. wait for the room's control channel to open;
//! 2. load the deck (an unreadable deck degrades to an empty one);
//! 3. build the instructions and the tool registry;
//! 4. start the avatar, then 5. the model session, which publishes into it;
//! 6. ask for a greeting;
//! 7. pump peer media, model events and tool calls until the peer leaves,
//!    shutdown is requested or something fatal happens;
//! 8. release the collaborators and the room.

use crate::audio_utils;
use crate::config::Config;
use crate::provider::{
    AvatarSession, ModelCommand, ModelSession, ModelSessionConfig, ModelSessionHandle,
};
use crate::room::{Room, RoomError, protocol::PeerEvent};
use presenter_core::{
    control::{ChannelError, ControlPublisher, DeliveryPolicy},
    debounce::DebounceGuard,
    deck::SlideDeck,
    generic_types::{ModelEvent, ToolCallRequest},
    instructions::{NavigationPolicy, build_instructions, greeting_prompt},
    presentation::PresentationState,
    registry::{ToolInvoker, ToolRegistry},
    sampler::VideoSampler,
    tools::{PresenterService, PresenterTools, ToolEvent},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on waiting for in-flight tool calls during teardown.
const TOOL_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-session knobs, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub persona_name: String,
    pub deck_path: PathBuf,
    pub debounce_interval: Duration,
    pub delivery: DeliveryPolicy,
    pub peer_ready_timeout: Duration,
    pub speaking_fps: f64,
    pub silent_fps: f64,
    pub navigation_policy: NavigationPolicy,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            persona_name: config.avatar_name.clone(),
            deck_path: config.deck_path.clone(),
            debounce_interval: config.debounce_interval,
            delivery: config.delivery,
            peer_ready_timeout: config.peer_ready_timeout,
            speaking_fps: config.speaking_fps,
            silent_fps: config.silent_fps,
            navigation_policy: config.navigation_policy,
        }
    }
}

/// Why a session ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Avatar session failed to start: {0:#}")]
    AvatarStart(anyhow::Error),
    #[error("Model session failed to start: {0:#}")]
    ModelStart(anyhow::Error),
    #[error("Model session closed: {0}")]
    ModelClosed(String),
    #[error("Control channel failed: {0}")]
    Channel(#[from] ChannelError),
    #[error("Tool transport failed: {0:#}")]
    ToolTransport(anyhow::Error),
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    PeerLeft,
    Shutdown,
}

#[derive(Clone)]
pub struct SessionOrchestrator {
    settings: Arc<SessionSettings>,
    avatar: Arc<dyn AvatarSession>,
    model: Arc<dyn ModelSession>,
}

impl SessionOrchestrator {
    pub fn new(
        settings: SessionSettings,
        avatar: Arc<dyn AvatarSession>,
        model: Arc<dyn ModelSession>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            avatar,
            model,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Runs a session and logs how it ended. Errors stop here.
    pub async fn supervise(
        self,
        room: Room,
        shutdown: CancellationToken,
    ) -> Result<SessionEnd, SessionError> {
        let result = self.run(room, shutdown).await;
        match &result {
            Ok(end) => info!(?end, "Presentation session finished."),
            Err(e) => error!(error = ?e, "Presentation session terminated with error."),
        }
        result
    }

    /// Runs a session to completion. The room is always released on return.
    pub async fn run(
        &self,
        mut room: Room,
        shutdown: CancellationToken,
    ) -> Result<SessionEnd, SessionError> {
        let handle = room.handle.clone();
        let result = self.run_inner(&mut room, &shutdown).await;
        handle.close();
        result
    }

    async fn run_inner(
        &self,
        room: &mut Room,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd, SessionError> {
        // --- 1. Room ---
        match room.handle.wait_ready(self.settings.peer_ready_timeout).await {
            Ok(()) => info!(room = room.handle.name(), "Peer ready; control channel open."),
            Err(RoomError::PeerLeft) => return Ok(SessionEnd::PeerLeft),
            Err(e @ RoomError::ReadyTimeout(_)) => {
                warn!(error = %e, "Continuing without a ready signal; early control messages may be dropped.")
            }
        }

        // --- 2. Deck ---
        let deck = SlideDeck::load_or_empty(&self.settings.deck_path).await;
        info!(slide_count = deck.len(), "Deck loaded.");

        // --- 3. Instructions and tools ---
        let instructions = build_instructions(
            &self.settings.persona_name,
            &deck,
            self.settings.navigation_policy,
        );
        let greeting = greeting_prompt(&self.settings.persona_name, &deck);

        let (tool_events_tx, tool_events_rx) = mpsc::channel(16);
        let tools = PresenterTools::new(
            Arc::new(Mutex::new(PresentationState::new(deck))),
            Arc::new(DebounceGuard::new(self.settings.debounce_interval)),
            ControlPublisher::new(Arc::new(room.handle.clone()), self.settings.delivery),
            Some(tool_events_tx),
        );
        let registry = ToolRegistry::start(PresenterService::new(Arc::new(tools)))
            .await
            .map_err(SessionError::ToolTransport)?;

        let result = async {
            let declarations = registry
                .declarations()
                .await
                .map_err(SessionError::ToolTransport)?;
            let config = ModelSessionConfig {
                instructions,
                tools: declarations,
            };
            self.run_collaborators(room, shutdown, config, greeting, registry.invoker(), tool_events_rx)
                .await
        }
        .await;

        registry.shutdown().await;
        result
    }

    async fn run_collaborators(
        &self,
        room: &mut Room,
        shutdown: &CancellationToken,
        config: ModelSessionConfig,
        greeting: String,
        invoker: ToolInvoker,
        tool_events: mpsc::Receiver<ToolEvent>,
    ) -> Result<SessionEnd, SessionError> {
        // --- 4. Avatar ---
        self.avatar
            .start(&room.handle)
            .await
            .map_err(SessionError::AvatarStart)?;

        // --- 5. Model, only once the avatar is up ---
        let model = match self.model.start(config).await {
            Ok(model) => model,
            Err(e) => {
                self.avatar.stop(&room.handle).await;
                return Err(SessionError::ModelStart(e));
            }
        };
        info!("Avatar and model sessions started.");

        let result = self
            .drive(room, shutdown, model, greeting, invoker, tool_events)
            .await;

        // --- 8. Release ---
        self.avatar.stop(&room.handle).await;
        result
    }

    async fn drive(
        &self,
        room: &mut Room,
        shutdown: &CancellationToken,
        model: ModelSessionHandle,
        greeting: String,
        invoker: ToolInvoker,
        mut tool_events: mpsc::Receiver<ToolEvent>,
    ) -> Result<SessionEnd, SessionError> {
        let ModelSessionHandle {
            commands,
            mut events,
            task: model_task,
        } = model;

        // --- 6. Greeting ---
        if commands
            .send(ModelCommand::GenerateReply {
                instructions: greeting,
            })
            .await
            .is_err()
        {
            model_task.abort();
            return Err(SessionError::ModelClosed(
                "session ended before the greeting".into(),
            ));
        }

        // --- 7. Session loop ---
        let mut sampler = VideoSampler::new(self.settings.speaking_fps, self.settings.silent_fps);
        let mut user_speaking = false;
        let mut tool_tasks = JoinSet::new();
        let handle = room.handle.clone();

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(SessionEnd::Shutdown),
                _ = handle.closed() => {
                    info!("Peer disconnected.");
                    break Ok(SessionEnd::PeerLeft);
                }
                Some(event) = room.events.recv() => {
                    self.forward_peer_event(event, &commands, &mut sampler, &mut user_speaking);
                }
                event = events.recv() => match event {
                    Some(ModelEvent::ToolCall(request)) => {
                        tool_tasks.spawn(run_tool_call(invoker.clone(), request, commands.clone()));
                    }
                    Some(ModelEvent::ToolCallCancelled(ids)) => {
                        info!(?ids, "Model cancelled tool calls; in-flight handlers will finish.");
                    }
                    Some(ModelEvent::AudioChunk(data)) => {
                        if let Err(e) = self.avatar.push_audio(&handle, data).await {
                            warn!(error = %e, "Failed to relay model audio to the avatar");
                        }
                    }
                    Some(ModelEvent::TurnComplete) => debug!("Model turn complete"),
                    Some(ModelEvent::Interrupted) => debug!("Model interrupted by the user"),
                    Some(ModelEvent::Error(message)) => {
                        warn!(%message, "Model session reported an error");
                    }
                    Some(ModelEvent::Closed) | None => {
                        break Err(SessionError::ModelClosed("connection closed".into()));
                    }
                },
                Some(event) = tool_events.recv() => match event {
                    ToolEvent::SlideChanged { slide_number, slide_count } => {
                        info!(slide_number, slide_count, "Slide on screen");
                    }
                    ToolEvent::Concluded => info!("Presentation concluded"),
                    ToolEvent::ChannelFailed(e) => break Err(SessionError::Channel(e)),
                },
                Some(joined) = tool_tasks.join_next() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Tool call task failed");
                    }
                }
            }
        };

        // In-flight tool calls may finish their publish; nothing is retried.
        let drained = tokio::time::timeout(TOOL_DRAIN_TIMEOUT, async {
            while tool_tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Abandoning tool calls still running at teardown");
            tool_tasks.abort_all();
        }

        drop(commands);
        model_task.abort();
        result
    }

    fn forward_peer_event(
        &self,
        event: PeerEvent,
        commands: &mpsc::Sender<ModelCommand>,
        sampler: &mut VideoSampler,
        user_speaking: &mut bool,
    ) {
        let command = match event {
            PeerEvent::Audio(data) => {
                *user_speaking = audio_utils::is_speech(&audio_utils::decode_i16(&data));
                ModelCommand::Audio(data)
            }
            PeerEvent::VideoFrame { mime_type, data } => {
                if !sampler.should_sample(*user_speaking) {
                    return;
                }
                ModelCommand::VideoFrame { mime_type, data }
            }
        };
        if let Err(e) = commands.try_send(command) {
            debug!(error = %e, "Dropping peer media; model session is busy");
        }
    }
}

/// Dispatches one tool call and hands the result back to the model.
async fn run_tool_call(
    invoker: ToolInvoker,
    request: ToolCallRequest,
    commands: mpsc::Sender<ModelCommand>,
) {
    info!(tool = %request.tool_name, call_id = %request.call_id, "Model called a tool");
    let (output, is_error) = match invoker.call(&request).await {
        Ok(outcome) => (outcome.output, outcome.is_error),
        Err(e) => {
            warn!(tool = %request.tool_name, error = %e, "Tool call failed");
            (e.to_string(), true)
        }
    };
    let result = ModelCommand::ToolResult {
        call_id: request.call_id,
        name: request.tool_name,
        output,
        is_error,
    };
    if commands.send(result).await.is_err() {
        debug!("Model session ended before the tool result was delivered");
    }
}
