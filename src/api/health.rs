//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::jobs::StatusCounts;
use crate::orchestrator::{AdapterModes, StageCounts};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when job counts cannot be read
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub adapters: AdapterModes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<StatusCounts>,
    pub stages: BTreeMap<&'static str, StageCounts>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let jobs = match state.registry.status_counts() {
        Ok(counts) => Some(counts),
        Err(e) => {
            tracing::warn!("Health check could not read job counts: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: if jobs.is_some() { "ok" } else { "degraded" }.to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        adapters: state.orchestrator.adapter_modes(),
        jobs,
        stages: state.orchestrator.metrics_snapshot(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
