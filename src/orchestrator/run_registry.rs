//! Active-run tracking per caller surface
//!
//! Each surface (a browser tab, a page section) has at most one live run.
//! Starting another run on the same surface cancels the previous one and
//! bumps a generation counter; progress events from an older generation are
//! dropped even if they were already in flight, and only its terminal event
//! still reaches its own caller. Last writer wins, nothing is queued.

use crate::orchestrator::pipeline::{Orchestrator, RunEvent, RunOutcome};
use crate::orchestrator::prompts::UserProfile;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Handle to a run registered on a surface
#[derive(Debug, Clone)]
pub struct RunTicket {
    /// Surface the run belongs to
    pub surface_id: String,
    /// Monotonic generation; higher wins
    pub generation: u64,
    /// Cancelled when the run is superseded or cancelled explicitly
    pub token: CancellationToken,
}

#[derive(Debug)]
struct ActiveRun {
    generation: u64,
    token: CancellationToken,
}

/// Registry of live runs, one per surface
#[derive(Debug, Default)]
pub struct RunRegistry {
    next_generation: AtomicU64,
    active: Mutex<HashMap<String, ActiveRun>>,
}

impl RunRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run on `surface_id`, cancelling any run already there
    pub async fn begin(&self, surface_id: &str) -> RunTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        let previous = self.active.lock().await.insert(
            surface_id.to_string(),
            ActiveRun {
                generation,
                token: token.clone(),
            },
        );

        if let Some(previous) = previous {
            tracing::info!(
                surface_id = %surface_id,
                superseded_generation = previous.generation,
                generation = generation,
                "Superseding active run"
            );
            previous.token.cancel();
        }

        RunTicket {
            surface_id: surface_id.to_string(),
            generation,
            token,
        }
    }

    /// Whether `ticket` is still the latest run on its surface
    pub async fn is_current(&self, ticket: &RunTicket) -> bool {
        self.active
            .lock()
            .await
            .get(&ticket.surface_id)
            .is_some_and(|run| run.generation == ticket.generation)
    }

    /// Cancel the run on `surface_id`
    ///
    /// Returns `false` if no run was active there.
    pub async fn cancel(&self, surface_id: &str) -> bool {
        match self.active.lock().await.remove(surface_id) {
            Some(run) => {
                tracing::info!(
                    surface_id = %surface_id,
                    generation = run.generation,
                    "Cancelling run"
                );
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every live run; returns how many were cancelled
    pub async fn cancel_all(&self) -> usize {
        let drained: Vec<ActiveRun> = self
            .active
            .lock()
            .await
            .drain()
            .map(|(_, run)| run)
            .collect();
        for run in &drained {
            run.token.cancel();
        }
        drained.len()
    }

    /// Forget `ticket`'s run if it is still the current one
    pub async fn finish(&self, ticket: &RunTicket) {
        let mut active = self.active.lock().await;
        if active
            .get(&ticket.surface_id)
            .is_some_and(|run| run.generation == ticket.generation)
        {
            active.remove(&ticket.surface_id);
        }
    }

    /// Number of surfaces with a live run
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Run the pipeline as the latest run on `surface_id`
    ///
    /// Progress events reach `out` only while this run is still current. Once
    /// a newer run starts on the same surface this one is cancelled and its
    /// stale progress is discarded; the terminal event still reaches `out`,
    /// which belongs to this run alone. Closing `out` cancels the run at once,
    /// even mid-request.
    pub async fn run_latest(
        &self,
        orchestrator: &Orchestrator,
        surface_id: &str,
        profile: UserProfile,
        out: mpsc::Sender<RunEvent>,
    ) -> RunOutcome {
        let ticket = self.begin(surface_id).await;
        let (inner_tx, mut inner_rx) = mpsc::channel::<RunEvent>(32);

        let pipeline = {
            let token = ticket.token.clone();
            async move {
                let outcome = orchestrator.run(profile, token, Some(&inner_tx)).await;
                drop(inner_tx);
                outcome
            }
        };

        let forward = async {
            let mut receiver_gone = false;
            loop {
                let event = tokio::select! {
                    event = inner_rx.recv() => event,
                    _ = out.closed(), if !receiver_gone => {
                        tracing::debug!(
                            surface_id = %ticket.surface_id,
                            generation = ticket.generation,
                            "Event receiver closed, cancelling run"
                        );
                        receiver_gone = true;
                        ticket.token.cancel();
                        continue;
                    }
                };
                let Some(event) = event else {
                    break;
                };
                if receiver_gone {
                    continue;
                }
                if !event.is_terminal() && !self.is_current(&ticket).await {
                    tracing::debug!(
                        surface_id = %ticket.surface_id,
                        generation = ticket.generation,
                        "Dropping event from superseded run"
                    );
                    continue;
                }
                if out.send(event).await.is_err() {
                    receiver_gone = true;
                    ticket.token.cancel();
                }
            }
        };

        let (outcome, ()) = tokio::join!(pipeline, forward);
        self.finish(&ticket).await;
        outcome
    }
}
