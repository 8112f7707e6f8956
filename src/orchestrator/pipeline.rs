//! Sequential WOOP pipeline
//!
//! Runs Intake → Wish → Outcome → Obstacles → Plan against a completion
//! endpoint. Each stage sends the whole conversation so far plus its own
//! prompt, parses the answer into the stage's shape, and records the raw
//! exchange before the next stage starts.
//!
//! A run is an explicit state machine ([`RunState`]). It only moves forward:
//! there are no retries, and once it has failed or been cancelled it stays
//! that way. Results of completed stages survive a later failure.

use crate::orchestrator::api_client::CompletionClient;
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::error::{StageError, StageFailure};
use crate::orchestrator::history::ConversationHistory;
use crate::orchestrator::prompts::{prompt_for_stage, UserProfile};
use crate::orchestrator::stages::{parse_stage_result, Stage, StageResult, StageResults};
use crate::orchestrator::utils::hash_text;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Where a run is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Created, no request issued yet
    NotStarted,
    /// Request for `stage` is in flight
    Running {
        /// Stage being executed
        stage: Stage,
    },
    /// `stage` finished and the next one has not started
    StageComplete {
        /// Last completed stage
        stage: Stage,
    },
    /// All five stages finished
    Complete,
    /// A stage failed or was cancelled; the run is over
    Failed(StageError),
}

impl RunState {
    /// Whether the run can make no further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed(_))
    }

    /// Short label for logs and status payloads
    pub fn label(&self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::Running { .. } => "running",
            RunState::StageComplete { .. } => "stage_complete",
            RunState::Complete => "complete",
            RunState::Failed(err) if err.is_cancelled() => "cancelled",
            RunState::Failed(_) => "failed",
        }
    }
}

/// Progress notifications emitted while a run executes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// The run was accepted
    RunStarted {
        /// Run id
        run_id: Uuid,
        /// Start time
        started_at: DateTime<Utc>,
    },
    /// A stage request is about to be sent
    StageStarted {
        /// Stage
        stage: Stage,
        /// 1-based stage number
        step: u8,
    },
    /// A stage produced its parsed result
    StageCompleted {
        /// Stage
        stage: Stage,
        /// 1-based stage number
        step: u8,
        /// Parsed result
        result: StageResult,
    },
    /// The run stopped on an error
    RunFailed {
        /// Stage that failed
        stage: Stage,
        /// 1-based stage number
        step: u8,
        /// Human-readable, stage-qualified message
        message: String,
    },
    /// The run was cancelled or superseded
    RunCancelled {
        /// Stage that was pending
        stage: Stage,
    },
    /// All stages completed
    RunCompleted {
        /// Number of stage results
        stages: usize,
    },
}

impl RunEvent {
    /// Whether this event ends the run's stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::RunFailed { .. }
                | RunEvent::RunCancelled { .. }
                | RunEvent::RunCompleted { .. }
        )
    }
}

/// One execution of the pipeline
///
/// Owns the conversation history and collected results. Drive it with
/// [`PipelineRun::advance`] or let [`Orchestrator::run`] loop over it.
#[derive(Debug)]
pub struct PipelineRun {
    id: Uuid,
    profile: UserProfile,
    state: RunState,
    history: ConversationHistory,
    results: StageResults,
}

impl PipelineRun {
    /// Create a run for a profile snapshot
    pub fn new(profile: UserProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile,
            state: RunState::NotStarted,
            history: ConversationHistory::new(),
            results: StageResults::new(),
        }
    }

    /// Run id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Conversation so far
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Results collected so far
    pub fn results(&self) -> &StageResults {
        &self.results
    }

    /// The stage [`advance`](Self::advance) would execute next
    pub fn next_stage(&self) -> Option<Stage> {
        match &self.state {
            RunState::NotStarted => Some(Stage::Intake),
            RunState::StageComplete { stage } => stage.next(),
            _ => None,
        }
    }

    fn fail(&mut self, stage: Stage, failure: StageFailure) -> StageError {
        let err = StageError::new(stage, failure);
        self.state = RunState::Failed(err.clone());
        err
    }

    /// Execute the next stage
    ///
    /// Cancellation is checked before the request is sent and again when it
    /// resolves; an in-flight request is abandoned as soon as `cancel` fires
    /// and whatever it would have returned is discarded.
    ///
    /// # Returns
    /// * `Ok(Some(result))` - the stage completed
    /// * `Ok(None)` - nothing left to do (already complete, failed or cancelled)
    /// * `Err(StageError)` - the stage failed or was cancelled; the run is now terminal
    pub async fn advance(
        &mut self,
        client: &dyn CompletionClient,
        config: &OrchestratorConfig,
        cancel: &CancellationToken,
    ) -> Result<Option<StageResult>, StageError> {
        let Some(stage) = self.next_stage() else {
            return Ok(None);
        };

        if cancel.is_cancelled() {
            return Err(self.fail(stage, StageFailure::Cancelled));
        }

        self.state = RunState::Running { stage };
        let prompt = prompt_for_stage(stage, &self.profile);
        let messages = self.history.request_messages(&prompt);
        let params = config.params_for(stage);

        tracing::debug!(
            stage = %stage,
            message_count = messages.len(),
            max_tokens = params.max_tokens,
            "Sending stage request"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            response = client.complete(&messages, params) => Some(response),
        };

        let raw = match response {
            None => return Err(self.fail(stage, StageFailure::Cancelled)),
            Some(_) if cancel.is_cancelled() => {
                return Err(self.fail(stage, StageFailure::Cancelled))
            }
            Some(Err(e)) => return Err(self.fail(stage, e.into())),
            Some(Ok(raw)) => raw,
        };

        let result = match parse_stage_result(stage, &raw) {
            Ok(result) => result,
            Err(failure) => return Err(self.fail(stage, failure)),
        };

        self.history.record_exchange(prompt, raw);
        self.results.insert(result.clone());
        self.state = match stage.next() {
            Some(_) => RunState::StageComplete { stage },
            None => RunState::Complete,
        };

        tracing::debug!(
            stage = %stage,
            history_len = self.history.len(),
            "Stage completed"
        );

        Ok(Some(result))
    }

    /// Consume the run into its final outcome
    pub fn into_outcome(self) -> RunOutcome {
        RunOutcome {
            run_id: self.id,
            state: self.state,
            history: self.history,
            results: self.results,
        }
    }
}

/// Everything a finished run leaves behind
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Run id
    pub run_id: Uuid,
    /// Terminal state
    pub state: RunState,
    /// Full conversation
    pub history: ConversationHistory,
    /// Results of every stage that completed
    pub results: StageResults,
}

impl RunOutcome {
    /// Whether all five stages completed
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete
    }

    /// The error that ended the run, if it failed or was cancelled
    pub fn error(&self) -> Option<&StageError> {
        match &self.state {
            RunState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Drives complete runs against a completion client
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator
    pub fn new(client: Arc<dyn CompletionClient>, config: OrchestratorConfig) -> Self {
        Self { client, config }
    }

    /// Generation settings in use
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run all five stages for `profile`
    ///
    /// Progress is sent on `events` as it happens. If the receiver goes away
    /// the run is cancelled, since nobody is left to see the results.
    pub async fn run(
        &self,
        profile: UserProfile,
        cancel: CancellationToken,
        events: Option<&mpsc::Sender<RunEvent>>,
    ) -> RunOutcome {
        let profile_hash = serde_json::to_string(&profile)
            .map(|json| hash_text(&json))
            .unwrap_or_default();
        let mut run = PipelineRun::new(profile);
        let span = tracing::info_span!(
            "woop_run",
            run_id = %run.id(),
            profile_hash = %profile_hash,
        );

        async {
            tracing::info!("Starting WOOP run");
            emit(
                events,
                &cancel,
                RunEvent::RunStarted {
                    run_id: run.id(),
                    started_at: Utc::now(),
                },
            )
            .await;

            while let Some(stage) = run.next_stage() {
                emit(
                    events,
                    &cancel,
                    RunEvent::StageStarted {
                        stage,
                        step: stage.number(),
                    },
                )
                .await;

                match run.advance(self.client.as_ref(), &self.config, &cancel).await {
                    Ok(Some(result)) => {
                        emit(
                            events,
                            &cancel,
                            RunEvent::StageCompleted {
                                stage,
                                step: stage.number(),
                                result,
                            },
                        )
                        .await;
                    }
                    Ok(None) => break,
                    Err(err) if err.is_cancelled() => {
                        tracing::info!(stage = %stage, "WOOP run cancelled");
                        // Receiver may already be gone; best effort only
                        if let Some(tx) = events {
                            let _ = tx.send(RunEvent::RunCancelled { stage }).await;
                        }
                    }
                    Err(err) => {
                        tracing::error!(stage = %stage, error = %err, "WOOP run failed");
                        emit(
                            events,
                            &cancel,
                            RunEvent::RunFailed {
                                stage,
                                step: stage.number(),
                                message: err.to_string(),
                            },
                        )
                        .await;
                    }
                }
            }

            if run.state() == &RunState::Complete {
                tracing::info!("WOOP run completed");
                emit(
                    events,
                    &cancel,
                    RunEvent::RunCompleted {
                        stages: run.results().len(),
                    },
                )
                .await;
            }
        }
        .instrument(span)
        .await;

        run.into_outcome()
    }
}

async fn emit(
    events: Option<&mpsc::Sender<RunEvent>>,
    cancel: &CancellationToken,
    event: RunEvent,
) {
    let Some(tx) = events else {
        return;
    };
    if tx.send(event).await.is_err() {
        tracing::debug!("Event receiver dropped, cancelling run");
        cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::completion_types::Role;
    use crate::orchestrator::error::CompletionError;
    use crate::orchestrator::test_support::{valid_responses, ScriptedClient};

    fn orchestrator(client: Arc<ScriptedClient>) -> Orchestrator {
        Orchestrator::new(client, OrchestratorConfig::default())
    }

    async fn collect(mut rx: mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn completed_stages(events: &[RunEvent]) -> Vec<Stage> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::StageCompleted { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_run_produces_five_results_and_ten_history_entries() {
        let client = Arc::new(ScriptedClient::with_valid_run());
        let (tx, rx) = mpsc::channel(32);

        let outcome = orchestrator(client.clone())
            .run(UserProfile::default(), CancellationToken::new(), Some(&tx))
            .await;
        drop(tx);
        let events = collect(rx).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.history.len(), 10);
        assert_eq!(client.requests().len(), 5);
        assert_eq!(completed_stages(&events), Stage::ALL.to_vec());
        assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
        assert_eq!(events.last(), Some(&RunEvent::RunCompleted { stages: 5 }));
    }

    #[tokio::test]
    async fn test_context_is_cumulative() {
        let client = Arc::new(ScriptedClient::with_valid_run());
        let outcome = orchestrator(client.clone())
            .run(UserProfile::default(), CancellationToken::new(), None)
            .await;
        assert!(outcome.is_complete());

        let requests = client.requests();
        let raw = valid_responses();
        for (k, (messages, _)) in requests.iter().enumerate() {
            // k prior exchanges plus the new prompt
            assert_eq!(messages.len(), 2 * k + 1);
            for j in 0..k {
                assert_eq!(messages[2 * j].role, Role::User);
                assert_eq!(messages[2 * j + 1].role, Role::Assistant);
                // Raw text, fences and prose included, is replayed
                assert_eq!(messages[2 * j + 1].content, raw[j]);
                // Earlier requests are a strict prefix of later ones
                assert_eq!(messages[2 * j], requests[j].0[2 * j]);
            }
            assert_eq!(messages.last().unwrap().role, Role::User);
        }
    }

    #[tokio::test]
    async fn test_stage_budgets_are_sent() {
        let client = Arc::new(ScriptedClient::with_valid_run());
        let config = OrchestratorConfig::default();
        Orchestrator::new(client.clone(), config.clone())
            .run(UserProfile::default(), CancellationToken::new(), None)
            .await;

        let requests = client.requests();
        assert_eq!(requests[0].1.max_tokens, config.intake_max_tokens);
        for (_, params) in &requests[1..] {
            assert_eq!(params.max_tokens, config.woop_max_tokens);
        }
    }

    #[tokio::test]
    async fn test_failure_at_stage_three_keeps_earlier_results() {
        let mut script: Vec<Result<String, CompletionError>> =
            valid_responses().into_iter().take(2).map(Ok).collect();
        script.push(Err(CompletionError::Http {
            status: 500,
            body: "internal error".to_string(),
        }));
        let client = Arc::new(ScriptedClient::new(script));
        let (tx, rx) = mpsc::channel(32);

        let outcome = orchestrator(client.clone())
            .run(UserProfile::default(), CancellationToken::new(), Some(&tx))
            .await;
        drop(tx);
        let events = collect(rx).await;

        let err = outcome.error().expect("run should have failed");
        assert_eq!(err.stage, Stage::Outcome);
        assert!(matches!(err.failure, StageFailure::Http { status: 500, .. }));
        assert!(outcome.results.intake().is_some());
        assert!(outcome.results.wish().is_some());
        assert!(outcome.results.outcome().is_none());
        assert!(outcome.results.obstacles().is_none());
        assert!(outcome.results.plan().is_none());
        assert_eq!(outcome.history.len(), 4);
        // No retry, nothing after the failing stage
        assert_eq!(client.requests().len(), 3);

        match events.last() {
            Some(RunEvent::RunFailed { step, message, .. }) => {
                assert_eq!(*step, 3);
                assert!(message.contains("internal error"));
            }
            other => panic!("expected RunFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parse_failure_surfaces_raw_text() {
        let mut script: Vec<Result<String, CompletionError>> =
            valid_responses().into_iter().take(1).map(Ok).collect();
        script.push(Ok("I'd rather not answer in JSON.".to_string()));
        let client = Arc::new(ScriptedClient::new(script));

        let outcome = orchestrator(client)
            .run(UserProfile::default(), CancellationToken::new(), None)
            .await;

        let err = outcome.error().unwrap();
        assert_eq!(err.stage, Stage::Wish);
        assert!(err.to_string().contains("I'd rather not answer in JSON."));
        // The unparseable exchange is not recorded
        assert_eq!(outcome.history.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_before_start_sends_nothing() {
        let client = Arc::new(ScriptedClient::with_valid_run());
        let token = CancellationToken::new();
        token.cancel();

        let outcome = orchestrator(client.clone())
            .run(UserProfile::default(), token, None)
            .await;

        let err = outcome.error().expect("cancelled run reports an error");
        assert_eq!(err.stage, Stage::Intake);
        assert!(err.is_cancelled());
        assert_eq!(outcome.state.label(), "cancelled");
        assert!(client.requests().is_empty());
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_stage_two_in_flight() {
        let client = Arc::new(ScriptedClient::with_valid_run());
        let gate = client.hold_call(1);
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(32);

        let orch = orchestrator(client.clone());
        let run_token = token.clone();
        let handle = tokio::spawn(async move {
            orch.run(UserProfile::default(), run_token, Some(&tx)).await
        });

        gate.entered.notified().await;
        token.cancel();
        // The response arrives after cancellation and must be ignored
        gate.release.notify_one();

        let outcome = handle.await.unwrap();
        let events = collect(rx).await;

        assert_eq!(
            outcome.error().map(ToString::to_string).as_deref(),
            Some("Stage 2 (Wish) could not be reached: cancelled")
        );
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results.wish().is_none());
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(completed_stages(&events), vec![Stage::Intake]);
        assert_eq!(
            events.last(),
            Some(&RunEvent::RunCancelled { stage: Stage::Wish })
        );
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels_run() {
        let client = Arc::new(ScriptedClient::with_valid_run());
        let (tx, rx) = mpsc::channel(32);
        drop(rx);

        let outcome = orchestrator(client.clone())
            .run(UserProfile::default(), CancellationToken::new(), Some(&tx))
            .await;

        assert!(outcome.error().is_some_and(StageError::is_cancelled));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_advance_after_terminal_state_is_noop() {
        let client = ScriptedClient::new(vec![Err(CompletionError::Transport(
            "connection refused".to_string(),
        ))]);
        let config = OrchestratorConfig::default();
        let token = CancellationToken::new();
        let mut run = PipelineRun::new(UserProfile::default());

        let err = run.advance(&client, &config, &token).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Stage 1 (Intake) could not be reached: connection refused"
        );
        assert!(run.state().is_terminal());
        assert_eq!(run.next_stage(), None);
        assert_eq!(run.advance(&client, &config, &token).await, Ok(None));
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_state_walks_forward_one_stage_at_a_time() {
        let client = ScriptedClient::with_valid_run();
        let config = OrchestratorConfig::default();
        let token = CancellationToken::new();
        let mut run = PipelineRun::new(UserProfile::default());
        assert_eq!(run.state(), &RunState::NotStarted);

        for stage in [Stage::Intake, Stage::Wish, Stage::Outcome, Stage::Obstacles] {
            let result = run.advance(&client, &config, &token).await.unwrap();
            assert_eq!(result.map(|r| r.stage()), Some(stage));
            assert_eq!(run.state(), &RunState::StageComplete { stage });
        }
        run.advance(&client, &config, &token).await.unwrap();
        assert_eq!(run.state(), &RunState::Complete);
        assert_eq!(run.state().label(), "complete");
    }

    #[test]
    fn test_run_event_serialization() {
        let event = RunEvent::StageStarted {
            stage: Stage::Obstacles,
            step: 4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage_started");
        assert_eq!(json["stage"], "obstacles");
        assert_eq!(json["step"], 4);
    }
}
