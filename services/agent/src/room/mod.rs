//! Rooms
//!
//! A room is one display surface connected over a WebSocket. The session side
//! holds a [`RoomHandle`], which doubles as the control channel; the socket
//! side holds the matching [`PeerLink`].
//!
//! - `protocol`: the JSON frames exchanged with the peer.
//! - `session`: the socket lifecycle, from token check to teardown.

pub mod protocol;
pub mod session;

pub use session::ws_handler;

use async_trait::async_trait;
use presenter_core::control::{ChannelError, ControlChannel};
use protocol::{Envelope, PeerEvent};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Peer did not become ready within {0:?}")]
    ReadyTimeout(Duration),
    #[error("Peer left the room")]
    PeerLeft,
}

/// The session's capability to talk to its peer.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    name: String,
    outbound: mpsc::Sender<Envelope>,
    ready: watch::Receiver<bool>,
    closed: CancellationToken,
}

/// A room as handed to the orchestrator: the handle plus incoming peer media.
pub struct Room {
    pub handle: RoomHandle,
    pub events: mpsc::Receiver<PeerEvent>,
}

/// The socket's side of a room.
pub struct PeerLink {
    pub outbound: mpsc::Receiver<Envelope>,
    pub events: mpsc::Sender<PeerEvent>,
    pub ready: watch::Sender<bool>,
    pub closed: CancellationToken,
}

/// Creates a connected room/peer pair with bounded queues in both directions.
pub fn open(name: impl Into<String>, capacity: usize) -> (Room, PeerLink) {
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    let (events_tx, events_rx) = mpsc::channel(capacity);
    let (ready_tx, ready_rx) = watch::channel(false);
    let closed = CancellationToken::new();

    let room = Room {
        handle: RoomHandle {
            name: name.into(),
            outbound: outbound_tx,
            ready: ready_rx,
            closed: closed.clone(),
        },
        events: events_rx,
    };
    let link = PeerLink {
        outbound: outbound_rx,
        events: events_tx,
        ready: ready_tx,
        closed,
    };
    (room, link)
}

impl RoomHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Waits until the peer reports `ready`, or fails once it has left.
    pub async fn ready(&self) -> Result<(), RoomError> {
        let mut ready = self.ready.clone();
        let became_ready = async move { ready.wait_for(|r| *r).await.map(|_| ()) };
        tokio::select! {
            _ = self.closed.cancelled() => Err(RoomError::PeerLeft),
            res = became_ready => res.map_err(|_| RoomError::PeerLeft),
        }
    }

    /// [`RoomHandle::ready`] bounded by `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), RoomError> {
        tokio::time::timeout(timeout, self.ready())
            .await
            .unwrap_or(Err(RoomError::ReadyTimeout(timeout)))
    }

    /// Resolves once the peer has gone or the room was closed locally.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Releases the room; the socket side sends a close frame.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Queues `payload` for the peer without waiting on the socket.
    pub fn publish_json(&self, topic: &str, payload: Value) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if !self.is_ready() {
            return Err(ChannelError::NotReady);
        }
        let envelope = Envelope {
            topic: topic.to_string(),
            payload,
        };
        self.outbound.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::PeerUnreachable,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

#[async_trait]
impl ControlChannel for RoomHandle {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), ChannelError> {
        let payload: Value =
            serde_json::from_slice(&payload).map_err(|e| ChannelError::Encode(e.to_string()))?;
        self.publish_json(topic, payload)
    }
}
