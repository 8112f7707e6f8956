//! Orchestrator constants
//!
//! Centralized constants used throughout the orchestrator module.

/// SSE stream termination signal
pub const SSE_DONE_SIGNAL: &str = "[DONE]";

/// SSE error prefix
pub const SSE_ERROR_PREFIX: &str = "[ERROR]";

/// Marker rendered in place of any profile field the user left blank
pub const NOT_PROVIDED: &str = "Not provided by the user";

/// Number of stages in a full run
pub const STAGE_COUNT: usize = 5;

/// Default sampling temperature for every stage
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default response budget for the intake stage
pub const DEFAULT_INTAKE_MAX_TOKENS: u32 = 1500;

/// Default response budget for the Wish, Outcome, Obstacles and Plan stages
pub const DEFAULT_WOOP_MAX_TOKENS: u32 = 800;

/// Surface id used when a caller does not name one
pub const DEFAULT_SURFACE_ID: &str = "default";
