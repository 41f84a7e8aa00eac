//! Minimal client for the Gemini Live (BidiGenerateContent) WebSocket API.
//!
//! [`connect`] performs the setup handshake and hands back a sender/receiver
//! pair so callers can drive both directions from a single `select!` loop.

pub mod types;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message as WsMessage},
};
use tracing::{debug, info, warn};
use types::{BidiGenerateContentSetup, ClientMessage, ServerMessage};

pub const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("Invalid live message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection closed before setup completed")]
    ClosedDuringSetup,
    #[error("Connection closed by server: {0}")]
    Closed(String),
}

/// Write half of a live session.
pub struct LiveSender {
    sink: SplitSink<WsStream, WsMessage>,
}

/// Read half of a live session.
pub struct LiveReceiver {
    stream: SplitStream<WsStream>,
}

/// Connects to the public endpoint and completes the setup handshake.
pub async fn connect(
    api_key: &str,
    setup: BidiGenerateContentSetup,
) -> Result<(LiveSender, LiveReceiver), LiveError> {
    connect_to(LIVE_ENDPOINT, api_key, setup).await
}

/// Like [`connect`] but against an arbitrary endpoint.
pub async fn connect_to(
    endpoint: &str,
    api_key: &str,
    setup: BidiGenerateContentSetup,
) -> Result<(LiveSender, LiveReceiver), LiveError> {
    let url = format!("{endpoint}?key={api_key}");
    let (ws_stream, _) = connect_async(url).await?;
    info!(model = %setup.model, "Connected to Gemini Live WebSocket.");

    let (sink, stream) = ws_stream.split();
    let mut sender = LiveSender { sink };
    let mut receiver = LiveReceiver { stream };

    sender.send(&ClientMessage::Setup(setup)).await?;

    loop {
        match receiver.next().await {
            Some(Ok(msg)) if msg.setup_complete.is_some() => {
                info!("Gemini session setup is complete. Ready for bidirectional streaming.");
                return Ok((sender, receiver));
            }
            Some(Ok(msg)) => debug!(?msg, "Ignoring message received during setup"),
            Some(Err(LiveError::Json(e))) => warn!(error = %e, "Unparseable message during setup"),
            Some(Err(LiveError::Closed(_))) | None => return Err(LiveError::ClosedDuringSetup),
            Some(Err(e)) => return Err(e),
        }
    }
}

impl LiveSender {
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), LiveError> {
        let payload = serde_json::to_string(msg)?;
        self.sink.send(WsMessage::Text(payload.into())).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), LiveError> {
        self.sink.close().await?;
        Ok(())
    }
}

impl LiveReceiver {
    /// Next server message. The server sends JSON in text or binary frames.
    pub async fn next(&mut self) -> Option<Result<ServerMessage, LiveError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e.into())),
            };
            match frame {
                WsMessage::Text(text) => {
                    return Some(serde_json::from_str(&text).map_err(LiveError::from));
                }
                WsMessage::Binary(data) => {
                    return Some(serde_json::from_slice(&data).map_err(LiveError::from));
                }
                WsMessage::Close(close_frame) => {
                    let reason = close_frame
                        .map(|f| format!("{} {}", f.code, f.reason.as_str()))
                        .unwrap_or_default();
                    return Some(Err(LiveError::Closed(reason)));
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }
}
