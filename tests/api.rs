//! Integration tests for the HTTP boundary

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use vidprobe::audio::{AudioExtractor, AudioOutput};
use vidprobe::capture::{CaptureOutput, VisualCapture};
use vidprobe::config::DEFAULT_SOURCE_PATTERN;
use vidprobe::detection::AuthorshipScorer;
use vidprobe::jobs::{JobId, JobRegistry};
use vidprobe::orchestrator::{Adapters, PipelineOrchestrator, StageBudgets};
use vidprobe::stage::StageError;
use vidprobe::stt::{Sentence, TranscriptOutput, Transcriber};
use vidprobe::{build_router, AppState};

struct StubCapture;

#[async_trait]
impl VisualCapture for StubCapture {
    async fn capture(&self, source_ref: &str, _job_id: JobId) -> Result<CaptureOutput, StageError> {
        if source_ref.contains("private") {
            return Err(StageError::Unreachable("page did not load".to_string()));
        }
        Ok(CaptureOutput {
            reference: Some("/screenshots/stub.png".to_string()),
            label: "Stub Video".to_string(),
            duration_ms: 1,
        })
    }

    fn name(&self) -> &str {
        "stub-capture"
    }
}

struct StubExtractor;

fn stub_audio() -> AudioOutput {
    AudioOutput {
        reference: PathBuf::from("/tmp/stub.wav"),
        duration_seconds: 12.5,
        size_mb: 0.38,
        duration_ms: 1,
        synthetic: false,
    }
}

#[async_trait]
impl AudioExtractor for StubExtractor {
    async fn extract(&self, _source_ref: &str, _job_id: JobId) -> Result<AudioOutput, StageError> {
        Ok(stub_audio())
    }

    async fn fallback(&self, _source_ref: &str, _job_id: JobId) -> Result<AudioOutput, StageError> {
        Ok(stub_audio())
    }

    fn name(&self) -> &str {
        "stub-extract"
    }
}

/// Always unconfigured, so the sample transcript is used
struct UnconfiguredTranscriber;

#[async_trait]
impl Transcriber for UnconfiguredTranscriber {
    async fn transcribe(&self, _audio_ref: &Path) -> Result<TranscriptOutput, StageError> {
        Err(StageError::Unconfigured("transcription key".to_string()))
    }

    fn name(&self) -> &str {
        "stub-transcribe"
    }
}

struct FixedTranscriber;

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio_ref: &Path) -> Result<TranscriptOutput, StageError> {
        Ok(TranscriptOutput {
            service: "Fixed".to_string(),
            sentences: vec![
                Sentence::timed("Hey everyone, I honestly think this is awesome!", 0.0, 2.0),
                Sentence::timed("Furthermore, we must optimize the pipeline.", 2.0, 4.0),
            ],
            language: Some("en".to_string()),
        })
    }

    fn name(&self) -> &str {
        "stub-transcribe"
    }
}

fn create_test_app(transcriber: Arc<dyn Transcriber>) -> axum::Router {
    let adapters = Adapters {
        capture: Arc::new(StubCapture),
        extractor: Arc::new(StubExtractor),
        transcriber,
        scorer: AuthorshipScorer::heuristic_only(),
    };
    let orchestrator = PipelineOrchestrator::new(
        adapters,
        Arc::new(JobRegistry::new()),
        StageBudgets::default(),
    );
    let pattern = regex::Regex::new(DEFAULT_SOURCE_PATTERN).unwrap();

    build_router(AppState::new(Arc::new(orchestrator), pattern))
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_analyze(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Poll until the job leaves the queued/running states
async fn wait_for_terminal(app: &axum::Router, status_url: &str) -> Value {
    for _ in 0..100 {
        let (status, job) = send(app, get(status_url)).await;
        assert_eq!(status, StatusCode::OK);
        if job["status"] == "completed" || job["status"] == "failed" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job did not finish: {}", status_url);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(Arc::new(FixedTranscriber));

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "vidprobe");
    assert_eq!(json["adapters"]["scoring"], "pattern_analysis");
    assert_eq!(json["jobs"]["queued"], 0);
    assert!(json["stages"]["capture"].is_object());
}

#[tokio::test]
async fn test_analyze_requires_url() {
    let app = create_test_app(Arc::new(FixedTranscriber));

    let (status, json) = send(&app, post_analyze(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");

    let (status, _) = send(&app, post_analyze(json!({ "url": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_rejects_foreign_url() {
    let app = create_test_app(Arc::new(FixedTranscriber));

    let (status, json) = send(&app, post_analyze(json!({ "url": "https://vimeo.com/1234" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "Invalid video URL format");
}

#[tokio::test]
async fn test_analyze_rejects_malformed_json() {
    let app = create_test_app(Arc::new(FixedTranscriber));

    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from("{ nope"))
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let app = create_test_app(Arc::new(FixedTranscriber));

    let (status, json) = send(&app, get(&format!("/result/{}", uuid::Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, get("/result/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_job_completes_end_to_end() {
    let app = create_test_app(Arc::new(FixedTranscriber));

    let (status, json) = send(
        &app,
        post_analyze(json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Analysis started");

    let status_url = json["status_url"].as_str().unwrap().to_string();
    assert_eq!(status_url, format!("/result/{}", json["job_id"].as_str().unwrap()));

    let job = wait_for_terminal(&app, &status_url).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress_label"], "Analysis completed");
    assert!(job["completed_at"].is_string());

    let report = &job["result"];
    assert_eq!(report["stage_records"].as_array().unwrap().len(), 4);
    assert_eq!(report["visual_label"], "Stub Video");

    let sentences = report["sentences"].as_array().unwrap();
    assert_eq!(sentences.len(), 2);
    assert_eq!(sentences[0]["ai_source"], "heuristic");
    assert!((sentences[0]["ai_probability"].as_f64().unwrap() - 0.05).abs() < 1e-9);

    let summary = &report["summary"];
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["sentence_count"], 2);
}

#[tokio::test]
async fn test_source_ref_alias_and_degraded_transcription() {
    let app = create_test_app(Arc::new(UnconfiguredTranscriber));

    let (status, json) = send(&app, post_analyze(json!({ "source_ref": "youtu.be/abc123" }))).await;
    assert_eq!(status, StatusCode::OK);

    let job = wait_for_terminal(&app, json["status_url"].as_str().unwrap()).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["source_ref"], "https://youtu.be/abc123");

    let records = job["result"]["stage_records"].as_array().unwrap();
    assert_eq!(records[2]["stage"], "transcribe");
    assert_eq!(records[2]["status"], "degraded");
    assert_eq!(job["result"]["sentences"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_fatal_capture_fails_job() {
    let app = create_test_app(Arc::new(FixedTranscriber));

    let (_, json) = send(
        &app,
        post_analyze(json!({ "url": "https://youtube.com/watch?v=private" })),
    )
    .await;

    let job = wait_for_terminal(&app, json["status_url"].as_str().unwrap()).await;
    assert_eq!(job["status"], "failed");
    assert_eq!(job["error"]["completed_steps"], 0);
    assert!(job["error"]["message"]
        .as_str()
        .unwrap()
        .contains("page did not load"));

    let records = job["result"]["stage_records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "failed");

    let (_, health) = send(&app, get("/health")).await;
    assert_eq!(health["jobs"]["failed"], 1);
    assert_eq!(health["stages"]["capture"]["failed"], 1);
}
