//! Anam talking-avatar session.
//!
//! The agent only brokers the avatar: it obtains a short-lived session token
//! from the Anam API and announces it on the room's `avatar` topic, where the
//! display's avatar client picks it up and attaches. Model speech is then
//! relayed on the same topic for lip-synced playback.

use super::{AVATAR_TOPIC, AvatarSession};
use crate::room::RoomHandle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{Instrument, debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct AnamConfig {
    pub api_url: String,
    pub api_key: String,
    pub avatar_id: String,
    pub persona_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionTokenRequest<'a> {
    persona_config: PersonaConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonaConfig<'a> {
    name: &'a str,
    avatar_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionTokenResponse {
    session_token: String,
}

pub struct AnamAvatar {
    http: reqwest::Client,
    config: AnamConfig,
}

impl AnamAvatar {
    pub fn new(config: AnamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn session_token(&self) -> Result<String> {
        let url = format!(
            "{}/v1/auth/session-token",
            self.config.api_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&SessionTokenRequest {
                persona_config: PersonaConfig {
                    name: &self.config.persona_name,
                    avatar_id: &self.config.avatar_id,
                },
            })
            .send()
            .await
            .context("Failed to reach the avatar API")?
            .error_for_status()
            .context("Avatar API rejected the session request")?;

        let body: SessionTokenResponse = response
            .json()
            .await
            .context("Avatar API returned an unexpected body")?;
        Ok(body.session_token)
    }
}

#[async_trait]
impl AvatarSession for AnamAvatar {
    #[instrument(skip_all, fields(room = room.name(), avatar_id = %self.config.avatar_id))]
    async fn start(&self, room: &RoomHandle) -> Result<()> {
        let session_token = self.session_token().await?;
        let announcement = json!({
            "type": "avatar_session",
            "session_token": session_token,
            "persona": self.config.persona_name,
        });

        match room.publish_json(AVATAR_TOPIC, announcement.clone()) {
            Ok(()) => info!("Avatar session started."),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Peer cannot take the avatar session yet; announcing once it is ready.");
                tokio::spawn(announce_when_ready(room.clone(), announcement).in_current_span());
            }
            Err(e) => {
                return Err(e).context("Failed to announce the avatar session to the room");
            }
        }
        Ok(())
    }

    async fn push_audio(&self, room: &RoomHandle, data: String) -> Result<()> {
        room.publish_json(AVATAR_TOPIC, json!({"type": "avatar_audio", "data": data}))?;
        Ok(())
    }

    async fn stop(&self, room: &RoomHandle) {
        if let Err(e) = room.publish_json(AVATAR_TOPIC, json!({"type": "avatar_stop"})) {
            warn!(error = %e, "Could not tell the peer to stop the avatar");
        }
    }
}

/// Re-sends a deferred announcement after the peer's `ready`.
async fn announce_when_ready(room: RoomHandle, announcement: Value) {
    if let Err(e) = room.ready().await {
        debug!(error = %e, "Dropping deferred avatar announcement.");
        return;
    }
    match room.publish_json(AVATAR_TOPIC, announcement) {
        Ok(()) => info!("Avatar session started after the peer became ready."),
        Err(e) => warn!(error = %e, "Could not announce the avatar session to the room"),
    }
}
