//! WOOP Planner Backend Library
//!
//! Career-guidance WOOP plans generated by a five-stage chat-completion
//! pipeline. This library exposes modules for testing and external use.
//! The server binary is in `src/main.rs`.

pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
/// Shared server state
pub mod state;
