//! HTTP surface for the `web` command.
//!
//! A small JSON API over the pipeline: trigger an analysis of a CSV batch on
//! disk and fetch the latest report. Each request gets its own coordinator,
//! so concurrent analyses never share per-run state.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::llm::TextGenerator;
use crate::pipeline::{PipelineCoordinator, PipelineOptions};
use crate::types::PipelineResult;

/// Shared server state.
#[derive(Clone)]
pub struct ApiState {
    generator: Option<Arc<dyn TextGenerator>>,
    latest_report: Arc<RwLock<Option<String>>>,
}

impl ApiState {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            generator,
            latest_report: Arc::new(RwLock::new(None)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    /// Path to a CSV batch on the server's filesystem
    data_path: PathBuf,
    #[serde(default)]
    no_reasoning: bool,
    #[serde(default)]
    no_debate: bool,
    #[serde(default)]
    no_planning: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/report/latest", get(latest_report))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(addr: &str, state: ApiState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "API server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn analyze(
    State(state): State<ApiState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<PipelineResult> {
    let options = PipelineOptions {
        enable_reasoning: !request.no_reasoning,
        enable_debate: !request.no_debate,
        enable_planning: !request.no_planning,
        ..Default::default()
    };
    let mut coordinator = PipelineCoordinator::with_options(state.generator.clone(), options);
    let result = coordinator.run_file(&request.data_path).await;

    if let Some(report) = &result.report {
        *state.latest_report.write().await = Some(report.clone());
    }
    Json(result)
}

async fn latest_report(State(state): State<ApiState>) -> Result<String, StatusCode> {
    state
        .latest_report
        .read()
        .await
        .clone()
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_report_is_empty_until_an_analysis_runs() {
        let state = ApiState::new(None);
        let result = latest_report(State(state)).await;
        assert_eq!(result.err(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn analyze_handler_reports_load_failures_in_band() {
        let state = ApiState::new(None);
        let request = AnalyzeRequest {
            data_path: PathBuf::from("/nonexistent/batch.csv"),
            no_reasoning: true,
            no_debate: true,
            no_planning: true,
        };
        let Json(result) = analyze(State(state), Json(request)).await;
        assert_eq!(result.status, crate::types::RunStatus::Failed);
        assert_eq!(result.errors[0].stage, "load");
    }
}
