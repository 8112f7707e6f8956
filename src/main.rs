//! WOOP Planner Backend
//!
//! A REST API and SSE server that turns a career-guidance profile into a
//! WOOP plan by chaining five chat-completion calls.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Instrument};
use uuid::Uuid;
use woop_planner_backend::api;
use woop_planner_backend::config::Config;
use woop_planner_backend::orchestrator::api_client::build_http_client;
use woop_planner_backend::orchestrator::{HttpCompletionClient, RunRegistry};
use woop_planner_backend::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Serialize)]
struct ServiceStatus {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    provider: &'static str,
}

/// Tags each request with an id, logs its latency and echoes the id back
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(request).await;
        info!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis(),
            "Request completed"
        );
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

fn router(app_state: Arc<RwLock<AppState>>, provider: &'static str) -> Router {
    let status = move || async move {
        Json(ServiceStatus {
            status: "ok",
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            provider,
        })
    };

    Router::new()
        .route("/", get(status.clone()))
        .route("/api/health", get(status))
        // WOOP runs
        .route("/api/woop/stream", post(api::woop::stream_woop))
        .route("/api/woop/cancel", post(api::woop::cancel_woop))
        .route("/api/woop/report", post(api::woop::render_report))
        // Generation settings
        .route(
            "/api/config",
            get(api::settings::get_config).post(api::settings::update_config),
        )
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Missing endpoint settings stop us here, before any request is made
    let config = Config::from_env()?;
    info!(config = ?config, "Configuration loaded");

    let http_client = build_http_client(&config.http)?;
    let completion_client = HttpCompletionClient::new(http_client, config.provider.clone());
    let state = AppState::new(Arc::new(completion_client));
    let runs = state.runs();
    let app = router(Arc::new(RwLock::new(state)), config.provider.name());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address {}: {}", config.server_addr(), e))?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        provider = config.provider.name(),
        version = env!("CARGO_PKG_VERSION"),
        "Listening on http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(runs))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM, after cancelling every live run so open
/// SSE streams can finish
async fn shutdown_signal(runs: Arc<RunRegistry>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "ctrl_c", "Shutting down"),
        _ = terminate => info!(signal = "sigterm", "Shutting down"),
    }

    let cancelled = runs.cancel_all().await;
    if cancelled > 0 {
        info!(cancelled, "Cancelled live runs");
    }
}
