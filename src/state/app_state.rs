// Application state management
// Holds the completion client, generation settings and live runs

use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::{CompletionClient, Orchestrator, RunRegistry};
use std::sync::Arc;

/// Main application state
/// Shared by every handler behind an `Arc<RwLock<_>>`
#[derive(Clone)]
pub struct AppState {
    /// Generation settings applied to new runs
    pub orchestrator_config: OrchestratorConfig,
    /// Completion endpoint client (shared connection pool)
    client: Arc<dyn CompletionClient>,
    /// Live runs, one per surface
    runs: Arc<RunRegistry>,
}

impl AppState {
    /// Create application state around a completion client
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            orchestrator_config: OrchestratorConfig::default(),
            client,
            runs: Arc::new(RunRegistry::new()),
        }
    }

    /// Orchestrator using the current settings
    ///
    /// Settings are copied, so a config update does not affect runs already
    /// in progress.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.client.clone(), self.orchestrator_config.clone())
    }

    /// Shared run registry
    pub fn runs(&self) -> Arc<RunRegistry> {
        self.runs.clone()
    }
}
