//! Presenter Core
//!
//! Session state and rules for the presentation agent: the slide deck, the
//! presentation state machine, debounce guard, control channel delivery
//! policy, and the tools the conversational model may call. Nothing here
//! opens a socket; transports are supplied by the service crate.

pub mod control;
pub mod debounce;
pub mod deck;
pub mod generic_types;
pub mod instructions;
pub mod presentation;
pub mod registry;
pub mod sampler;
pub mod tools;
