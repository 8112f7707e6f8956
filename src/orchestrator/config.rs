//! Orchestrator configuration
//!
//! Generation budgets for the pipeline, adjustable at runtime.

use crate::error::AppError;
use crate::orchestrator::completion_types::GenerationParams;
use crate::orchestrator::constants::{
    DEFAULT_INTAKE_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_WOOP_MAX_TOKENS,
};
use crate::orchestrator::stages::Stage;
use serde::{Deserialize, Serialize};

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorConfig {
    /// Sampling temperature for every stage
    pub temperature: f32,
    /// Response budget for the intake stage
    pub intake_max_tokens: u32,
    /// Response budget for each of the four WOOP stages
    pub woop_max_tokens: u32,
    /// Maximum serialized profile size in bytes
    pub max_profile_bytes: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            intake_max_tokens: DEFAULT_INTAKE_MAX_TOKENS,
            woop_max_tokens: DEFAULT_WOOP_MAX_TOKENS,
            max_profile_bytes: 10000, // 10KB
        }
    }
}

impl OrchestratorConfig {
    /// Generation parameters for `stage`
    pub fn params_for(&self, stage: Stage) -> GenerationParams {
        let max_tokens = match stage {
            Stage::Intake => self.intake_max_tokens,
            Stage::Wish | Stage::Outcome | Stage::Obstacles | Stage::Plan => self.woop_max_tokens,
        };
        GenerationParams {
            temperature: self.temperature,
            max_tokens,
        }
    }
}

/// Request body for updating orchestrator configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdateRequest {
    /// Sampling temperature (optional)
    pub temperature: Option<f32>,
    /// Intake response budget (optional)
    pub intake_max_tokens: Option<u32>,
    /// WOOP stage response budget (optional)
    pub woop_max_tokens: Option<u32>,
    /// Maximum profile size in bytes (optional)
    pub max_profile_bytes: Option<usize>,
}

/// Validate and apply configuration updates
///
/// This function validates the update request and applies valid changes to the config.
/// Returns an error if any validation fails; nothing is applied in that case.
///
/// # Arguments
/// * `config` - The current config to update
/// * `request` - The update request with optional fields
///
/// # Returns
/// * `Ok(OrchestratorConfig)` - The updated configuration
/// * `Err(AppError)` - If validation fails
pub fn validate_and_apply_config_update(
    mut config: OrchestratorConfig,
    request: ConfigUpdateRequest,
) -> Result<OrchestratorConfig, AppError> {
    if let Some(temperature) = request.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(AppError::InvalidConfigUpdate(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        config.temperature = temperature;
    }

    if let Some(tokens) = request.intake_max_tokens {
        if tokens == 0 {
            return Err(AppError::InvalidConfigUpdate(
                "intake_max_tokens must be > 0".to_string(),
            ));
        }
        config.intake_max_tokens = tokens;
    }

    if let Some(tokens) = request.woop_max_tokens {
        if tokens == 0 {
            return Err(AppError::InvalidConfigUpdate(
                "woop_max_tokens must be > 0".to_string(),
            ));
        }
        config.woop_max_tokens = tokens;
    }

    if let Some(max_bytes) = request.max_profile_bytes {
        if max_bytes == 0 {
            return Err(AppError::InvalidConfigUpdate(
                "max_profile_bytes must be > 0".to_string(),
            ));
        }
        config.max_profile_bytes = max_bytes;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intake_budget_is_larger_by_default() {
        let config = OrchestratorConfig::default();
        let intake = config.params_for(Stage::Intake);
        for stage in [Stage::Wish, Stage::Outcome, Stage::Obstacles, Stage::Plan] {
            assert!(intake.max_tokens > config.params_for(stage).max_tokens);
        }
    }

    #[test]
    fn test_apply_valid_update() {
        let updated = validate_and_apply_config_update(
            OrchestratorConfig::default(),
            ConfigUpdateRequest {
                temperature: Some(0.2),
                woop_max_tokens: Some(500),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.temperature, 0.2);
        assert_eq!(updated.woop_max_tokens, 500);
        assert_eq!(updated.intake_max_tokens, DEFAULT_INTAKE_MAX_TOKENS);
    }

    #[test]
    fn test_reject_invalid_updates() {
        let bad_requests = vec![
            ConfigUpdateRequest {
                temperature: Some(3.5),
                ..Default::default()
            },
            ConfigUpdateRequest {
                intake_max_tokens: Some(0),
                ..Default::default()
            },
            ConfigUpdateRequest {
                woop_max_tokens: Some(0),
                ..Default::default()
            },
            ConfigUpdateRequest {
                max_profile_bytes: Some(0),
                ..Default::default()
            },
        ];

        for request in bad_requests {
            let result = validate_and_apply_config_update(OrchestratorConfig::default(), request);
            assert!(matches!(result, Err(AppError::InvalidConfigUpdate(_))));
        }
    }
}
