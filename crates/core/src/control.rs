//! Control Channel
//!
//! Control messages tell the remote display surface to change state (show a
//! slide, fill a form field, click an element). They travel as small JSON
//! objects over a reliable out-of-band channel supplied by the room layer.
//!
//! The delivery policy favours the conversation over slide sync: transient
//! failures are logged and swallowed, anything unrecognised is propagated.

use crate::deck::Slide;
use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Topic agreed with the display surface for control messages.
pub const CONTROL_TOPIC: &str = "browser-control";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    SlideChange,
    FillField,
    ClickElement,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::SlideChange => "slide_change",
            ControlKind::FillField => "fill_field",
            ControlKind::ClickElement => "click_element",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable instruction for the display surface.
///
/// Serialises flat: `{"type": "<kind>", ...payload}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMessage {
    kind: ControlKind,
    payload: Map<String, Value>,
}

impl ControlMessage {
    pub fn slide_change(slide: &Slide) -> Self {
        let mut payload = Map::new();
        payload.insert("slide_number".into(), slide.index.into());
        payload.insert("image_url".into(), slide.image_reference.clone().into());
        Self {
            kind: ControlKind::SlideChange,
            payload,
        }
    }

    pub fn fill_field(field: impl Into<String>, value: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("field".into(), Value::String(field.into()));
        payload.insert("value".into(), Value::String(value.into()));
        Self {
            kind: ControlKind::FillField,
            payload,
        }
    }

    pub fn click_element(element: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("element".into(), Value::String(element.into()));
        Self {
            kind: ControlKind::ClickElement,
            payload,
        }
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// UTF-8 JSON bytes as handed to the channel.
    pub fn to_wire(&self) -> Result<Vec<u8>, ChannelError> {
        serde_json::to_vec(self).map_err(|e| ChannelError::Encode(e.to_string()))
    }
}

impl Serialize for ControlMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.payload.len() + 1))?;
        map.serialize_entry("type", self.kind.as_str())?;
        for (key, value) in &self.payload {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Why a publish failed. Classification is structural; see [`ChannelError::is_transient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Control channel is not open yet")]
    NotReady,
    #[error("Remote peer is temporarily unreachable")]
    PeerUnreachable,
    #[error("Transient network error: {0}")]
    Network(String),
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
    #[error("Control channel is closed")]
    Closed,
    #[error("Failed to encode control message: {0}")]
    Encode(String),
    #[error("Control channel failure: {0}")]
    Other(String),
}

impl ChannelError {
    /// Errors likely to resolve on their own. Everything else is fatal.
    pub fn is_transient(&self) -> bool {
        match self {
            ChannelError::NotReady
            | ChannelError::PeerUnreachable
            | ChannelError::Network(_)
            | ChannelError::Timeout(_) => true,
            ChannelError::Closed | ChannelError::Encode(_) | ChannelError::Other(_) => false,
        }
    }
}

/// A reliable out-of-band path to the remote peer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Sends one opaque payload tagged with `topic`.
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), ChannelError>;
}

/// How hard the publisher tries before giving up on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Total sends per message; values above 1 add bounded redundancy.
    pub redundant_send_count: u32,
    pub redundant_send_delay: Duration,
    /// Upper bound on a single send; `None` waits as long as the channel does.
    pub publish_timeout: Option<Duration>,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            redundant_send_count: 1,
            redundant_send_delay: Duration::from_millis(50),
            publish_timeout: Some(Duration::from_secs(5)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// At least one send succeeded.
    Delivered,
    /// Every send failed transiently; the message was dropped.
    Dropped,
}

/// Applies the [`DeliveryPolicy`] on top of a [`ControlChannel`].
#[derive(Clone)]
pub struct ControlPublisher {
    channel: Arc<dyn ControlChannel>,
    policy: DeliveryPolicy,
}

impl ControlPublisher {
    pub fn new(channel: Arc<dyn ControlChannel>, policy: DeliveryPolicy) -> Self {
        Self { channel, policy }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// Publishes `message`. Transient failures are logged and reported as
    /// [`Delivery::Dropped`]; a fatal failure stops immediately with `Err`.
    pub async fn publish(&self, message: &ControlMessage) -> Result<Delivery, ChannelError> {
        let payload = message.to_wire()?;
        let attempts = self.policy.redundant_send_count.max(1);
        let mut delivered = false;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.policy.redundant_send_delay).await;
            }
            match self.send_once(payload.clone()).await {
                Ok(()) => delivered = true,
                Err(e) if e.is_transient() => {
                    warn!(kind = %message.kind(), attempt, error = %e, "Transient control channel error; continuing");
                }
                Err(e) => return Err(e),
            }
        }

        if delivered {
            debug!(kind = %message.kind(), attempts, "Control message published");
            Ok(Delivery::Delivered)
        } else {
            Ok(Delivery::Dropped)
        }
    }

    async fn send_once(&self, payload: Vec<u8>) -> Result<(), ChannelError> {
        let send = self.channel.send(CONTROL_TOPIC, payload);
        match self.policy.publish_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| ChannelError::Timeout(limit))?,
            None => send.await,
        }
    }
}
