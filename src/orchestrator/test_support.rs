//! In-process completion client for unit tests

use crate::orchestrator::api_client::CompletionClient;
use crate::orchestrator::completion_types::{ChatMessage, GenerationParams};
use crate::orchestrator::error::CompletionError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Valid raw responses for the five stages, in order
pub(crate) fn valid_responses() -> Vec<String> {
    vec![
        r#"{"summary": "22-year-old with sewing skills", "strengths": ["sewing"], "interests": ["fashion"], "constraints": ["little capital"], "recommended_track": "entrepreneurship"}"#.to_string(),
        "```json\n{\"wish\": \"Open a tailoring shop within a year\", \"rationale\": \"Builds on sewing\"}\n```".to_string(),
        r#"Here is the outcome: {"outcome": "A steady income from my own shop", "benefits": ["independence"], "feeling": "proud"}"#.to_string(),
        r#"{"obstacles": [{"obstacle": "No sewing machine", "type": "external"}, {"obstacle": "Fear of failure", "type": "internal"}]}"#.to_string(),
        r#"{"plans": [{"if": "I cannot afford a machine", "then": "I will rent one from the cooperative"}], "first_step": "Visit the cooperative", "timeline": "3 months"}"#.to_string(),
    ]
}

/// A held call: `entered` fires when the call starts, `release` lets it answer
#[derive(Clone)]
pub(crate) struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Answers calls from a script and records every request
#[derive(Default)]
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<(Vec<ChatMessage>, GenerationParams)>>,
    gates: Mutex<HashMap<usize, Gate>>,
}

impl ScriptedClient {
    pub(crate) fn new(responses: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    pub(crate) fn with_valid_run() -> Self {
        Self::new(valid_responses().into_iter().map(Ok).collect())
    }

    /// Hold the call with zero-based index `call` until released
    pub(crate) fn hold_call(&self, call: usize) -> Gate {
        let gate = Gate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        self.gates.lock().unwrap().insert(call, gate.clone());
        gate
    }

    pub(crate) fn requests(&self) -> Vec<(Vec<ChatMessage>, GenerationParams)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, CompletionError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push((messages.to_vec(), params));
            requests.len() - 1
        };

        let gate = self.gates.lock().unwrap().get(&call).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Transport("script exhausted".to_string())))
    }
}
