//! Utility binary for running one WOOP pipeline from the command line
//! This is a utility binary, not part of the main application
//!
//! Usage: `run_woop <profile.json>`
//! Provider settings are read from the same environment variables as the server.

use anyhow::Context;
use std::env;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use woop_planner_backend::config::Config;
use woop_planner_backend::orchestrator::api_client::build_http_client;
use woop_planner_backend::orchestrator::config::OrchestratorConfig;
use woop_planner_backend::orchestrator::report::render_markdown;
use woop_planner_backend::orchestrator::{HttpCompletionClient, Orchestrator};
use woop_planner_backend::orchestrator::{RunEvent, UserProfile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = env::args()
        .nth(1)
        .context("usage: run_woop <profile.json>")?;
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read profile from {}", path))?;
    let profile: UserProfile =
        serde_json::from_str(&raw).with_context(|| format!("Invalid profile JSON in {}", path))?;

    let config = Config::from_env()?;
    println!("Running WOOP pipeline against {}...\n", config.provider.name());

    let http_client = build_http_client(&config.http)?;
    let client = HttpCompletionClient::new(http_client, config.provider.clone());
    let orchestrator = Orchestrator::new(Arc::new(client), OrchestratorConfig::default());

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let (tx, rx) = mpsc::channel::<RunEvent>(32);
    let printer = tokio::spawn(async move {
        let mut events = ReceiverStream::new(rx);
        while let Some(event) = events.next().await {
            match event {
                RunEvent::StageStarted { stage, step } => {
                    println!("{}. {}...", step, stage.name());
                }
                RunEvent::StageCompleted { result, .. } => {
                    let json = serde_json::to_string_pretty(&result).unwrap_or_default();
                    println!("   ✓ {}\n", json.replace('\n', "\n     "));
                }
                RunEvent::RunFailed { message, .. } => {
                    eprintln!("   ✗ {}", message);
                }
                RunEvent::RunCancelled { stage } => {
                    eprintln!("   ✗ Cancelled during {}", stage.name());
                }
                RunEvent::RunStarted { .. } | RunEvent::RunCompleted { .. } => {}
            }
        }
    });

    let outcome = orchestrator.run(profile, cancel, Some(&tx)).await;
    drop(tx);
    printer.await?;

    if let Some(err) = outcome.error() {
        anyhow::bail!("WOOP run failed: {}", err);
    }
    if !outcome.is_complete() {
        anyhow::bail!("WOOP run stopped early ({})", outcome.state.label());
    }

    println!("{}", render_markdown(&outcome.results));
    Ok(())
}
