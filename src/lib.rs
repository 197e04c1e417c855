pub mod api;
pub mod audio;
pub mod capture;
pub mod config;
pub mod detection;
pub mod jobs;
pub mod orchestrator;
pub mod stage;
pub mod storage;
pub mod stt;

use axum::Router;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppConfig, ConfigError};
use crate::jobs::JobRegistry;
use crate::orchestrator::PipelineOrchestrator;

/// Shared state behind every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub registry: Arc<JobRegistry>,
    /// Accepted shape of submitted video URLs
    pub source_pattern: Arc<Regex>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, source_pattern: Regex) -> Self {
        Self {
            registry: Arc::clone(orchestrator.registry()),
            orchestrator,
            source_pattern: Arc::new(source_pattern),
            startup_time: Utc::now(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let registry = Arc::new(JobRegistry::new());
        let orchestrator = Arc::new(PipelineOrchestrator::from_config(config, registry));
        Ok(Self::new(orchestrator, config.source_regex()?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analyze_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run() -> Result<(), StartupError> {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    let config = config::load()?;
    log_startup(&config);

    for dir in [config.screenshots_dir(), config.audio_dir(), config.results_dir()] {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("Could not create {}: {}", dir.display(), e);
        }
    }

    let state = AppState::from_config(&config)?;
    let app = build_router(state).nest_service("/screenshots", ServeDir::new(config.screenshots_dir()));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!("vidprobe listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn log_startup(config: &AppConfig) {
    tracing::info!("Data directory: {}", config.data_dir.display());
    match config.elevenlabs_api_key() {
        Some(key) => tracing::info!("ElevenLabs key: {}", config::mask_api_key(&key)),
        None => tracing::info!("ElevenLabs key: not set (sample transcripts)"),
    }
    match config.gptzero_api_key() {
        Some(key) => tracing::info!("GPTZero key: {}", config::mask_api_key(&key)),
        None => tracing::info!("GPTZero key: not set (pattern analysis)"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
