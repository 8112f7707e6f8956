//! Orchestrator module
//!
//! The five-stage WOOP pipeline and its building blocks: the completion
//! client, stage schemas and parsing, prompt construction, conversation
//! history, the run state machine and per-surface run tracking.

pub mod api_client;
pub mod completion_types;
pub mod config;
pub mod constants;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod run_registry;
pub mod stages;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use api_client::{CompletionClient, HttpCompletionClient};
pub use error::{CompletionError, StageError, StageFailure};
pub use pipeline::{Orchestrator, PipelineRun, RunEvent, RunOutcome, RunState};
pub use prompts::{CareerTrack, UserProfile};
pub use run_registry::{RunRegistry, RunTicket};
pub use stages::{Stage, StageResult, StageResults};
