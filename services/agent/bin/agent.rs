//! Main Entrypoint for the Presenter Agent
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment (fatal if credentials are missing).
//! 2. Building the avatar and model adapters and the session orchestrator.
//! 3. Constructing the Axum router.
//! 4. Starting the server and handling graceful shutdown.

use anyhow::Context;
use presenter_agent::{
    config::Config,
    orchestrator::{SessionOrchestrator, SessionSettings},
    provider::{
        anam::{AnamAvatar, AnamConfig},
        gemini::{GeminiConfig, GeminiLive},
    },
    router::create_router,
    state::AppState,
};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
}

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal(sessions: CancellationToken) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
    sessions.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            // No configured level yet; report at the default one.
            init_tracing("info");
            error!(error = %e, "Refusing to start: configuration is invalid.");
            return Err(e).context("Failed to load configuration");
        }
    };

    // --- 2. Initialize Logging ---
    init_tracing(config.log_level.as_str());
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Collaborators ---
    let avatar = Arc::new(AnamAvatar::new(AnamConfig {
        api_url: config.anam_api_url.clone(),
        api_key: config.anam_api_key.clone(),
        avatar_id: config.anam_avatar_id.clone(),
        persona_name: config.avatar_name.clone(),
    }));
    let model = Arc::new(GeminiLive::new(GeminiConfig::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_voice.clone(),
    )));
    let orchestrator = SessionOrchestrator::new(SessionSettings::from(&config), avatar, model);

    let app_state = Arc::new(AppState::new(config.clone(), orchestrator));
    let app = create_router(app_state.clone());

    // --- 4. Start Server ---
    info!(
        model = %config.gemini_model,
        avatar = %config.avatar_name,
        deck = %config.deck_path.display(),
        navigation = ?config.navigation_policy,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(app_state.shutdown.clone()))
    .await?;

    info!("Server has shut down.");
    Ok(())
}
