//! WOOP run API handlers
//!
//! Runs are streamed to the front end as Server-Sent Events: one `data:` line
//! per [`RunEvent`], each stage result as soon as it is parsed, then
//! `data: [DONE]`. Pipeline failures travel inside the stream as
//! `run_failed` events; only request validation fails the HTTP call itself.

use crate::error::AppError;
use crate::orchestrator::constants::{DEFAULT_SURFACE_ID, SSE_DONE_SIGNAL, SSE_ERROR_PREFIX};
use crate::orchestrator::report::render_markdown;
use crate::orchestrator::{RunEvent, StageResult, StageResults, UserProfile};
use crate::state::AppState;
use anyhow::anyhow;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Helper function to format a stream into SSE (Server-Sent Events) format
///
/// Takes a stream of `Result<String, axum::Error>` and converts it to SSE format
/// where each item is formatted as "data: <content>\n\n"
fn format_sse_stream(
    stream: impl futures_util::Stream<Item = Result<String, axum::Error>> + Send + 'static,
) -> impl futures_util::Stream<Item = Result<String, std::io::Error>> {
    stream.map(|event_result| {
        let sse_text = match event_result {
            Ok(data) => format!("data: {}\n\n", data),
            Err(e) => format!("data: {} {}\n\n", SSE_ERROR_PREFIX, e),
        };
        Ok::<_, std::io::Error>(sse_text)
    })
}

/// Request to start a run
#[derive(Deserialize, Debug)]
pub struct WoopRunRequest {
    /// Caller surface; a new run on the same surface replaces the old one
    #[serde(default)]
    pub surface_id: Option<String>,
    /// Profile snapshot for the intake stage
    pub profile: UserProfile,
}

/// Request to cancel the run on a surface
#[derive(Deserialize, Debug)]
pub struct CancelRequest {
    /// Surface whose run should stop
    #[serde(default)]
    pub surface_id: Option<String>,
}

/// Request to render results as Markdown
#[derive(Deserialize, Debug)]
pub struct ReportRequest {
    /// Stage results, as delivered in `stage_completed` events
    pub results: Vec<StageResult>,
}

/// Rendered report
#[derive(Serialize, Debug)]
pub struct ReportResponse {
    /// Markdown document
    pub markdown: String,
    /// Number of stages included
    pub stages: usize,
}

/// Generic acknowledgement
#[derive(Serialize, Debug)]
pub struct MessageResponse {
    /// Human-readable message
    pub message: String,
    /// Status string
    pub status: String,
}

fn surface_or_default(surface_id: Option<String>) -> String {
    surface_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SURFACE_ID.to_string())
}

/// POST /api/woop/stream - Run the five-stage pipeline
///
/// # Flow
/// 1. Validate the profile size
/// 2. Register the run on its surface (superseding any run already there)
/// 3. Stream each `RunEvent` via SSE, ending with `[DONE]`
///
/// Dropping the connection cancels the run.
pub async fn stream_woop(
    State(state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<WoopRunRequest>,
) -> Result<Response, AppError> {
    let (orchestrator, runs) = {
        let state_read = state.read().await;
        (state_read.orchestrator(), state_read.runs())
    };

    let max_profile_bytes = orchestrator.config().max_profile_bytes;
    let profile_len = serde_json::to_vec(&request.profile)
        .map_err(|e| AppError::Internal(anyhow!("Failed to serialize profile: {}", e)))?
        .len();
    if profile_len > max_profile_bytes {
        return Err(AppError::InvalidProfile(format!(
            "Profile too large ({} > {} bytes)",
            profile_len, max_profile_bytes
        )));
    }

    let surface_id = surface_or_default(request.surface_id);
    let profile = request.profile;
    let (tx, mut rx) = mpsc::channel::<RunEvent>(32);

    tracing::debug!(surface_id = %surface_id, "Starting streamed WOOP run");
    tokio::spawn(async move {
        runs.run_latest(&orchestrator, &surface_id, profile, tx).await;
    });

    use async_stream::stream;

    let stream = stream! {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok::<String, axum::Error>(json),
                Err(e) => yield Err(axum::Error::new(e)),
            }
        }
        // Signal stream completion
        yield Ok::<String, axum::Error>(SSE_DONE_SIGNAL.to_string());
    };

    let sse_stream = format_sse_stream(stream);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(sse_stream))
        .map_err(|e| AppError::Internal(anyhow!("Failed to build response: {}", e)))
}

/// POST /api/woop/cancel - Cancel the run on a surface
pub async fn cancel_woop(
    State(state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let surface_id = surface_or_default(request.surface_id);
    let runs = state.read().await.runs();

    if !runs.cancel(&surface_id).await {
        return Err(AppError::RunNotFound(surface_id));
    }

    Ok(Json(MessageResponse {
        message: format!("Run on surface '{}' cancelled", surface_id),
        status: "cancelled".to_string(),
    }))
}

/// POST /api/woop/report - Render stage results as Markdown
pub async fn render_report(Json(request): Json<ReportRequest>) -> Json<ReportResponse> {
    let mut results = StageResults::new();
    for result in request.results {
        results.insert(result);
    }
    Json(ReportResponse {
        markdown: render_markdown(&results),
        stages: results.len(),
    })
}
