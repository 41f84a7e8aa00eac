//! Manages the WebSocket connection lifecycle for a room.

use super::{
    PeerLink,
    protocol::{Envelope, PeerEvent, PeerMessage},
};
use crate::{handlers::ApiError, state::AppState, token::RoomClaims};
use anyhow::Result;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

/// Queue depth in each direction between the socket and the session.
const ROOM_QUEUE_CAPACITY: usize = 64;

#[derive(Deserialize)]
pub struct JoinParams {
    pub token: String,
}

/// Axum handler to upgrade an HTTP connection to a room WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<JoinParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let claims = state
        .tokens
        .verify(&params.token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, claims)))
}

/// Main handler for an individual room connection.
///
/// Spawns the orchestrated session and a writer task, then reads peer frames
/// on this task until the peer leaves or the session releases the room.
#[instrument(name = "room_socket", skip_all, fields(room = %claims.room, participant = %claims.sub))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, claims: RoomClaims) {
    info!("Peer joined the room.");
    let (room, link) = super::open(claims.room.clone(), ROOM_QUEUE_CAPACITY);
    let PeerLink {
        mut outbound,
        events,
        ready,
        closed,
    } = link;
    let (mut socket_tx, mut socket_rx) = socket.split();

    let session_id = Uuid::new_v4();
    let session_span = tracing::info_span!("presentation_session", %session_id, room = %claims.room);
    let session_task = tokio::spawn(
        state
            .orchestrator
            .clone()
            .supervise(room, state.shutdown.child_token())
            .instrument(session_span),
    );

    let writer_closed = closed.clone();
    let writer = tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    _ = writer_closed.cancelled() => break,
                    envelope = outbound.recv() => {
                        let Some(envelope) = envelope else { break };
                        if let Err(e) = send_envelope(&mut socket_tx, &envelope).await {
                            warn!(error = %e, "Failed to write to peer; closing room.");
                            writer_closed.cancel();
                            break;
                        }
                    }
                }
            }
            let _ = socket_tx.send(Message::Close(None)).await;
        }
        .in_current_span(),
    );

    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            msg = socket_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<PeerMessage>(&text) {
                    Ok(PeerMessage::Ready) => {
                        info!("Peer is ready.");
                        ready.send_replace(true);
                    }
                    Ok(PeerMessage::Ping) => {}
                    Ok(PeerMessage::Audio { data }) => forward(&events, PeerEvent::Audio(data)),
                    Ok(PeerMessage::VideoFrame { mime_type, data }) => {
                        forward(&events, PeerEvent::VideoFrame { mime_type, data })
                    }
                    Err(e) => warn!(error = %e, "Ignoring malformed peer message."),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Peer left the room.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Error receiving from peer.");
                    break;
                }
            },
        }
    }

    closed.cancel();
    let _ = writer.await;
    if let Err(e) = session_task.await {
        error!(error = ?e, "Presentation session task panicked.");
    }
    info!("Room closed.");
}

fn forward(events: &mpsc::Sender<PeerEvent>, event: PeerEvent) {
    if let Err(e) = events.try_send(event) {
        debug!(error = %e, "Dropping peer media; session is busy.");
    }
}

/// Serializes and sends one envelope to the peer.
async fn send_envelope(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    envelope: &Envelope,
) -> Result<()> {
    let serialized = serde_json::to_string(envelope)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
