//! Generation settings API handlers

use crate::error::AppError;
use crate::orchestrator::config::{
    validate_and_apply_config_update, ConfigUpdateRequest, OrchestratorConfig,
};
use crate::state::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use tokio::sync::RwLock;

/// GET /api/config - Current generation settings
pub async fn get_config(State(state): State<Arc<RwLock<AppState>>>) -> Json<OrchestratorConfig> {
    Json(state.read().await.orchestrator_config.clone())
}

/// POST /api/config - Update generation settings
///
/// Applies to runs started after the update.
pub async fn update_config(
    State(state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<ConfigUpdateRequest>,
) -> Result<Json<OrchestratorConfig>, AppError> {
    let mut state_write = state.write().await;
    let updated =
        validate_and_apply_config_update(state_write.orchestrator_config.clone(), request)?;
    state_write.orchestrator_config = updated.clone();

    tracing::info!(config = ?updated, "Orchestrator configuration updated");
    Ok(Json(updated))
}
