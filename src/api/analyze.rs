//! Submission and status handlers
//!
//! POST /analyze, GET /result/:id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::jobs::{Job, JobId};
use crate::AppState;

/// POST /analyze request
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default, alias = "source_ref")]
    pub url: Option<String>,
}

/// POST /analyze response
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub job_id: JobId,
    pub message: String,
    pub status_url: String,
}

/// POST /analyze
///
/// Allocates a job and starts the pipeline in the background.
pub async fn submit_analysis(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let url = request
        .url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Video URL is required".to_string()))?;

    if !state.source_pattern.is_match(&url) {
        return Err(ApiError::BadRequest("Invalid video URL format".to_string()));
    }
    let url = with_scheme(url);

    let job_id = state.registry.create(&url)?;

    tokio::spawn(state.orchestrator.clone().supervise(job_id));

    Ok(Json(AnalyzeResponse {
        success: true,
        job_id,
        message: "Analysis started".to_string(),
        status_url: format!("/result/{}", job_id),
    }))
}

/// GET /result/:id
///
/// Current job state, including the partial report while running.
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job_id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound("Job not found".to_string()))?;
    let job = state.registry.get(job_id)?;
    Ok(Json(job))
}

/// The pattern accepts scheme-less links; the pipeline needs a full URL
fn with_scheme(url: String) -> String {
    let lowered = url.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        url
    } else {
        format!("https://{}", url)
    }
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(submit_analysis))
        .route("/result/:id", get(get_result))
}
