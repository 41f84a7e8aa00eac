//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources handed to the HTTP and room handlers.

use crate::{config::Config, orchestrator::SessionOrchestrator, token::RoomTokenIssuer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: RoomTokenIssuer,
    pub orchestrator: SessionOrchestrator,
    /// Cancelled on process shutdown; every session holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, orchestrator: SessionOrchestrator) -> Self {
        let tokens = RoomTokenIssuer::new(config.room_api_key.clone(), &config.room_api_secret);
        Self {
            config: Arc::new(config),
            tokens,
            orchestrator,
            shutdown: CancellationToken::new(),
        }
    }
}
