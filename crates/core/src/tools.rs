//! Presenter Tools
//!
//! The tools the conversational model may call mid-conversation. Each tool is a
//! variant of [`ToolCall`] with a typed argument struct; [`PresenterService`]
//! exposes them through the Model Context Protocol so the registry can list
//! their schemas and dispatch by name.
//!
//! Tool names and descriptions are the model-facing API and must stay stable.

use crate::control::{ChannelError, ControlMessage, ControlPublisher};
use crate::debounce::DebounceGuard;
use crate::presentation::{Advanced, Position, PresentationError, PresentationState};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

pub const FILL_FORM_FIELD: &str = "fill_form_field";
pub const CLICK_ELEMENT: &str = "click_element";
pub const ADVANCE_SLIDE: &str = "advance_slide";

/// Returned when a slide change is suppressed by the debounce window.
pub const ALREADY_ACTIVE: &str = "already active";
pub const CONCLUDED: &str = "That was the final slide. The presentation is concluded.";

// --- Data Structures for Tools ---

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct FillFormFieldArgs {
    /// The field to fill.
    #[schemars(description = "The field to fill (e.g. \"Full Name\", \"Email Address\")")]
    pub field_identifier: String,
    #[schemars(description = "The value to enter into the field")]
    pub value: String,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct ClickElementArgs {
    #[schemars(description = "Button or element text (e.g. \"Submit\", \"Next\")")]
    pub element_description: String,
}

/// The closed set of tools, one variant per tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    FillFormField(FillFormFieldArgs),
    ClickElement(ClickElementArgs),
    AdvanceSlide,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Actions rate-limited by the debounce guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedAction {
    SlideTransition,
}

/// Side effects the orchestrator may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    SlideChanged { slide_number: u32, slide_count: u32 },
    Concluded,
    /// A publish failed with a non-transient error.
    ChannelFailed(ChannelError),
}

// --- Handlers ---

/// Tool handlers with their shared session state.
///
/// Only `advance_slide` touches the presentation state. The debounce check and
/// the state transition both finish before any publish is awaited.
pub struct PresenterTools {
    presentation: Arc<Mutex<PresentationState>>,
    debounce: Arc<DebounceGuard<GuardedAction>>,
    publisher: ControlPublisher,
    events_tx: Option<mpsc::Sender<ToolEvent>>,
}

impl PresenterTools {
    pub fn new(
        presentation: Arc<Mutex<PresentationState>>,
        debounce: Arc<DebounceGuard<GuardedAction>>,
        publisher: ControlPublisher,
        events_tx: Option<mpsc::Sender<ToolEvent>>,
    ) -> Self {
        Self {
            presentation,
            debounce,
            publisher,
            events_tx,
        }
    }

    pub async fn dispatch(&self, call: ToolCall) -> Result<String, ToolError> {
        match call {
            ToolCall::FillFormField(args) => self.fill_form_field(args).await,
            ToolCall::ClickElement(args) => self.click_element(args).await,
            ToolCall::AdvanceSlide => self.advance_slide().await,
        }
    }

    /// Never debounced: distinct fields are independent.
    pub async fn fill_form_field(&self, args: FillFormFieldArgs) -> Result<String, ToolError> {
        info!(field = %args.field_identifier, "Executing tool 'fill_form_field'");
        self.deliver(&ControlMessage::fill_field(args.field_identifier, args.value))
            .await?;
        Ok("ok".to_string())
    }

    pub async fn click_element(&self, args: ClickElementArgs) -> Result<String, ToolError> {
        info!(element = %args.element_description, "Executing tool 'click_element'");
        self.deliver(&ControlMessage::click_element(args.element_description))
            .await?;
        Ok("ok".to_string())
    }

    /// Shows the next slide (the first one if the presentation has not started).
    ///
    /// State-machine violations come back as text for the model, not as errors.
    pub async fn advance_slide(&self) -> Result<String, ToolError> {
        if !self.debounce.allow(GuardedAction::SlideTransition) {
            info!("Ignoring 'advance_slide' inside the debounce window");
            return Ok(ALREADY_ACTIVE.to_string());
        }

        let (outcome, slide_count) = {
            let mut state = self.presentation.lock().await;
            let outcome = match state.position() {
                Position::NotStarted => state.start().map(|slide| Advanced::Slide(slide.clone())),
                _ => state.advance(),
            };
            (outcome, state.slide_count())
        };

        match outcome {
            Ok(Advanced::Slide(slide)) => {
                info!(slide_number = slide.index, slide_count, "Advancing to slide");
                self.deliver(&ControlMessage::slide_change(&slide)).await?;
                self.notify(ToolEvent::SlideChanged {
                    slide_number: slide.index,
                    slide_count,
                })
                .await;
                Ok(format!(
                    "Now showing slide {} of {}.",
                    slide.index, slide_count
                ))
            }
            Ok(Advanced::Concluded) => {
                info!("Presentation concluded");
                self.notify(ToolEvent::Concluded).await;
                Ok(CONCLUDED.to_string())
            }
            Err(e @ (PresentationError::AlreadyConcluded | PresentationError::EmptyDeck)) => {
                info!(reason = %e, "Slide transition rejected");
                Ok(e.to_string())
            }
            Err(e) => {
                warn!(reason = %e, "Unexpected slide transition state");
                Ok(e.to_string())
            }
        }
    }

    async fn deliver(&self, message: &ControlMessage) -> Result<(), ToolError> {
        if let Err(e) = self.publisher.publish(message).await {
            self.notify(ToolEvent::ChannelFailed(e.clone())).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn notify(&self, event: ToolEvent) {
        if let Some(tx) = &self.events_tx {
            if tx.send(event).await.is_err() {
                warn!("Failed to broadcast tool event: receiver dropped.");
            }
        }
    }
}

// --- Service and Handler Implementation ---

/// MCP server exposing [`PresenterTools`] by name with typed schemas.
pub struct PresenterService {
    tools: Arc<PresenterTools>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for PresenterService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl PresenterService {
    pub fn new(tools: Arc<PresenterTools>) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Fill in a form field on the user's current page. Returns a confirmation message."
    )]
    pub async fn fill_form_field(
        &self,
        args: Parameters<FillFormFieldArgs>,
    ) -> Result<String, String> {
        self.tools
            .dispatch(ToolCall::FillFormField(args.0))
            .await
            .map_err(|e| e.to_string())
    }

    #[tool(description = "Click a button or link on the user's page. Returns a confirmation message.")]
    pub async fn click_element(&self, args: Parameters<ClickElementArgs>) -> Result<String, String> {
        self.tools
            .dispatch(ToolCall::ClickElement(args.0))
            .await
            .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Show the next slide of the presentation (the first call shows slide 1). Returns which slide is now on screen, or that the presentation is concluded."
    )]
    pub async fn advance_slide(&self) -> Result<String, String> {
        self.tools
            .dispatch(ToolCall::AdvanceSlide)
            .await
            .map_err(|e| e.to_string())
    }
}
