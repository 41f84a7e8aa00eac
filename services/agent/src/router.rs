//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, the room WebSocket, static slides and OpenAPI
//! documentation.

use crate::{
    handlers,
    models::{ConnectionDetails, DeckSummary, ErrorResponse, SlideSummary},
    room::ws_handler,
    state::AppState,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::connection_details,
        handlers::deck_summary,
        handlers::healthz,
    ),
    components(
        schemas(ConnectionDetails, DeckSummary, SlideSummary, ErrorResponse)
    ),
    tags(
        (name = "Presenter API", description = "Room bootstrapping and deck metadata for the presenter agent")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let slides = ServeDir::new(&app_state.config.slides_dir);

    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/api/connection-details", get(handlers::connection_details))
        .route("/api/deck", get(handlers::deck_summary))
        .route("/room", get(ws_handler))
        .with_state(app_state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/healthz", get(handlers::healthz))
        .nest_service("/slides", slides)
        .merge(api_router)
        .layer(cors)
}
