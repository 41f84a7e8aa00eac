//! Axum Handlers for the REST API
//!
//! Room bootstrapping and the read side of the slide conversion output.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use presenter_core::deck::SlideDeck;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    models::{ConnectionDetails, DeckSummary, ErrorResponse},
    state::AppState,
};

pub enum ApiError {
    Unauthorized(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Issue credentials for joining a fresh room.
#[utoipa::path(
    get,
    path = "/api/connection-details",
    responses(
        (status = 200, description = "Room credentials", body = ConnectionDetails),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn connection_details(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConnectionDetails>, ApiError> {
    let room_name = format!("room_{}", rand::random_range(1000..10000));
    let identity = format!("user_{}", rand::random_range(1000..10000));
    let participant_token = state.tokens.issue(&room_name, &identity, "user")?;

    info!(room = %room_name, %identity, "Issued room credentials");
    Ok(Json(ConnectionDetails {
        server_url: state.config.public_url.clone(),
        room_name,
        participant_token,
    }))
}

/// Describe the converted deck currently on disk.
#[utoipa::path(
    get,
    path = "/api/deck",
    responses(
        (status = 200, description = "Deck summary; an absent deck has zero slides", body = DeckSummary),
    )
)]
pub async fn deck_summary(State(state): State<Arc<AppState>>) -> Json<DeckSummary> {
    let deck = SlideDeck::load_or_empty(&state.config.deck_path).await;
    Json(DeckSummary::from(&deck))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn healthz() -> &'static str {
    "ok"
}
