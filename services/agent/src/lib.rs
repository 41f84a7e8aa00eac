//! Presenter Agent Library Crate
//!
//! Everything the `agent` binary runs: configuration, the room server and its
//! tokens, the HTTP API, the avatar and model adapters, and the session
//! orchestrator that ties them together. The binary is a thin wrapper.

pub mod audio_utils;
pub mod config;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod room;
pub mod router;
pub mod state;
pub mod token;
