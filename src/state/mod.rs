// State management module
// Handles shared server state: completion client, settings and live runs

pub mod app_state;

pub use app_state::AppState;
