//! Error types and error handling for the application
//!
//! `ConfigError` covers startup configuration and stops the binaries before
//! any request is made. `AppError` is the service-level error; it implements
//! `IntoResponse` to provide consistent error formatting. Pipeline failures
//! are reported inside the event stream as `run_failed` events, not as HTTP
//! errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Configuration errors, raised before any request is attempted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is absent or empty
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    /// A value is present but unusable
    #[error("Invalid configuration value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// The submitted profile was rejected before a run started
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// A configuration update request failed validation
    #[error("Invalid configuration update: {0}")]
    InvalidConfigUpdate(String),

    /// No active run for the given surface
    #[error("No active run for surface: {0}")]
    RunNotFound(String),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidProfile(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidConfigUpdate(_) => StatusCode::BAD_REQUEST,
            AppError::RunNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
