// orchestrator/mod.rs — Four-stage analysis pipeline for one job
//
// capture -> extract -> transcribe -> score, strictly in order. A recoverable
// stage error (or a timeout) swaps in the adapter's fallback and marks the
// stage degraded; anything else stops the run with a trailing failed record.

use crate::audio::{AudioExtractor, YtDlpExtractor};
use crate::capture::{ChromeCapture, VisualCapture};
use crate::config::AppConfig;
use crate::detection::{AiSource, AuthorshipScore, AuthorshipScorer, GptZeroClassifier, RemoteClassifier};
use crate::jobs::{JobFailure, JobId, JobPatch, JobRegistry, JobStatus};
use crate::stage::{Details, StageError, StageName, StageOutcome, StageOutput, StageRecord, StageStatus};
use crate::storage::ReportStore;
use crate::stt::{ElevenLabsTranscriber, Sentence, Transcriber};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::timeout;

pub mod metrics;
pub mod report;

pub use metrics::{StageCounts, StageMetrics};
pub use report::{mean_ai_probability, Report, Summary, SummaryStatus};

const DEFAULT_SCORING_CONCURRENCY: usize = 4;

/// Run ended on a fatal stage; the partial report is kept
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PipelineFailure {
    pub report: Report,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
pub struct StageBudgets {
    pub capture: Duration,
    pub extract: Duration,
    pub transcribe: Duration,
    /// Applied to each sentence separately
    pub score_per_sentence: Duration,
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self {
            capture: Duration::from_secs(60),
            extract: Duration::from_secs(300),
            transcribe: Duration::from_secs(120),
            score_per_sentence: Duration::from_secs(10),
        }
    }
}

impl StageBudgets {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            capture: config.capture_timeout(),
            extract: config.extract_timeout(),
            transcribe: config.transcribe_timeout(),
            score_per_sentence: config.score_timeout(),
        }
    }
}

pub struct Adapters {
    pub capture: Arc<dyn VisualCapture>,
    pub extractor: Arc<dyn AudioExtractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub scorer: AuthorshipScorer,
}

/// Which collaborators are wired in, for `/health`
#[derive(Debug, Clone, Serialize)]
pub struct AdapterModes {
    pub capture: String,
    pub extract: String,
    pub transcribe: String,
    pub scoring: String,
}

/// Counts of per-sentence score sources for the scoring stage record
#[derive(Debug, Clone, Copy, Default)]
struct ScoringTally {
    remote: usize,
    heuristic: usize,
    fallback: usize,
}

impl ScoringTally {
    fn add(&mut self, source: AiSource) {
        match source {
            AiSource::Remote => self.remote += 1,
            AiSource::Heuristic => self.heuristic += 1,
            AiSource::Fallback => self.fallback += 1,
        }
    }

    fn total(&self) -> usize {
        self.remote + self.heuristic + self.fallback
    }
}

impl StageOutput for ScoringTally {
    fn details(&self) -> Details {
        let mut details = Details::new();
        details.insert("sentences_scored".into(), self.total().into());
        details.insert("remote".into(), self.remote.into());
        details.insert("heuristic".into(), self.heuristic.into());
        details.insert("fallback".into(), self.fallback.into());
        details
    }
}

pub struct PipelineOrchestrator {
    capture: Arc<dyn VisualCapture>,
    extractor: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn Transcriber>,
    scorer: AuthorshipScorer,
    registry: Arc<JobRegistry>,
    store: Option<ReportStore>,
    budgets: StageBudgets,
    scoring_concurrency: usize,
    metrics: Mutex<StageMetrics>,
}

impl PipelineOrchestrator {
    pub fn new(adapters: Adapters, registry: Arc<JobRegistry>, budgets: StageBudgets) -> Self {
        Self {
            capture: adapters.capture,
            extractor: adapters.extractor,
            transcriber: adapters.transcriber,
            scorer: adapters.scorer,
            registry,
            store: None,
            budgets,
            scoring_concurrency: DEFAULT_SCORING_CONCURRENCY,
            metrics: Mutex::new(StageMetrics::new()),
        }
    }

    pub fn with_store(mut self, store: ReportStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_scoring_concurrency(mut self, concurrency: usize) -> Self {
        self.scoring_concurrency = concurrency.max(1);
        self
    }

    /// Production wiring: Chrome, yt-dlp, ElevenLabs and (if keyed) GPTZero
    pub fn from_config(config: &AppConfig, registry: Arc<JobRegistry>) -> Self {
        let remote: Option<Box<dyn RemoteClassifier>> = config
            .gptzero_api_key()
            .map(|key| Box::new(GptZeroClassifier::new(key)) as Box<dyn RemoteClassifier>);

        if remote.is_none() {
            tracing::info!("GPTZero API key not configured, scoring will use pattern analysis");
        }

        let adapters = Adapters {
            capture: Arc::new(ChromeCapture::new(
                PathBuf::from(&config.chrome_bin),
                config.screenshots_dir(),
            )),
            extractor: Arc::new(YtDlpExtractor::new(
                PathBuf::from(&config.ytdlp_bin),
                config.audio_dir(),
            )),
            transcriber: Arc::new(ElevenLabsTranscriber::new(config.elevenlabs_api_key())),
            scorer: AuthorshipScorer::new(remote, config.score_timeout()),
        };

        Self::new(adapters, registry, StageBudgets::from_config(config))
            .with_store(ReportStore::new(config.results_dir()))
            .with_scoring_concurrency(config.scoring_concurrency)
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn adapter_modes(&self) -> AdapterModes {
        AdapterModes {
            capture: self.capture.name().to_string(),
            extract: self.extractor.name().to_string(),
            transcribe: self.transcriber.name().to_string(),
            scoring: self
                .scorer
                .remote_name()
                .unwrap_or("pattern_analysis")
                .to_string(),
        }
    }

    pub fn metrics_snapshot(&self) -> BTreeMap<&'static str, StageCounts> {
        self.metrics
            .lock()
            .map(|metrics| metrics.snapshot())
            .unwrap_or_default()
    }

    /// Drive a registered job to a terminal state; never propagates errors
    pub async fn process(&self, job_id: JobId) {
        let source_ref = match self.registry.get(job_id) {
            Ok(job) => job.source_ref,
            Err(e) => {
                tracing::error!("Cannot process job {}: {}", job_id, e);
                return;
            }
        };

        if let Err(e) = self.registry.transition(job_id, JobPatch::running()) {
            tracing::error!("Cannot start job {}: {}", job_id, e);
            return;
        }

        let (patch, report) = match self.run(&source_ref, job_id).await {
            Ok(report) => {
                tracing::info!("Analysis pipeline completed for job {}", job_id);
                (JobPatch::completed(report.clone()), report)
            }
            Err(failure) => {
                tracing::error!("Analysis pipeline failed for job {}: {}", job_id, failure.message);
                let error = JobFailure {
                    message: failure.message.clone(),
                    completed_steps: failure.report.completed_steps(),
                };
                (JobPatch::failed(error, failure.report.clone()), failure.report)
            }
        };

        self.finalize(job_id, patch, report).await;
    }

    /// Run `process` in its own task so a panicking adapter still fails the job
    pub async fn supervise(self: Arc<Self>, job_id: JobId) {
        let worker = Arc::clone(&self);
        let handle = tokio::spawn(async move { worker.process(job_id).await });

        if let Err(e) = handle.await {
            tracing::error!("Pipeline task for job {} aborted: {}", job_id, e);
            self.abandon(job_id, &e.to_string()).await;
        }
    }

    /// Fail a running job whose pipeline task died, blaming the stage in flight
    async fn abandon(&self, job_id: JobId, cause: &str) {
        let job = match self.registry.get(job_id) {
            Ok(job) if job.status == JobStatus::Running => job,
            Ok(_) => return,
            Err(e) => {
                tracing::error!("Cannot abandon job {}: {}", job_id, e);
                return;
            }
        };

        let mut report = match job.result {
            Some(partial) => partial,
            None => Report::new(job_id, &job.source_ref),
        };
        let stage = StageName::ALL
            .get(report.stage_records.len())
            .copied()
            .unwrap_or(StageName::Score);
        let message = format!("{} stage failed: {}", stage, cause);

        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record(stage, StageStatus::Failed);
        }
        let mut details = Details::new();
        details.insert("error".into(), cause.into());
        report.stage_records.push(StageRecord {
            stage,
            status: StageStatus::Failed,
            duration_ms: 0,
            details,
        });

        let total_ms = (chrono::Utc::now() - job.created_at).num_milliseconds().max(0) as u64;
        let completed_steps = report.completed_steps();
        report.summary = Some(Summary::failed(total_ms, &report.sentences, &message, completed_steps));

        let error = JobFailure {
            message,
            completed_steps,
        };
        self.finalize(job_id, JobPatch::failed(error, report.clone()), report).await;
    }

    /// Terminal transition, then persistence only if the registry accepted it
    async fn finalize(&self, job_id: JobId, patch: JobPatch, report: Report) {
        match self.registry.transition(job_id, patch) {
            Ok(_) => self.persist(report).await,
            Err(e) => tracing::error!("Terminal transition rejected for job {}: {}", job_id, e),
        }
    }

    /// Run all four stages for `source_ref`
    pub async fn run(&self, source_ref: &str, job_id: JobId) -> Result<Report, PipelineFailure> {
        let started = Instant::now();
        let mut report = Report::new(job_id, source_ref);

        tracing::info!("Starting analysis pipeline for job {}: {}", job_id, source_ref);

        match self.execute(&mut report, source_ref, job_id).await {
            Ok(()) => {
                let total_ms = elapsed_ms(started);
                report.summary = Some(Summary::completed(total_ms, &report.sentences));
                Ok(report)
            }
            Err(message) => {
                let total_ms = elapsed_ms(started);
                let completed_steps = report.completed_steps();
                report.summary = Some(Summary::failed(
                    total_ms,
                    &report.sentences,
                    &message,
                    completed_steps,
                ));
                Err(PipelineFailure { report, message })
            }
        }
    }

    async fn execute(&self, report: &mut Report, source_ref: &str, job_id: JobId) -> Result<(), String> {
        // Step 1: visual capture
        self.publish(job_id, StageName::Capture, report);
        let stage_started = Instant::now();
        let outcome = if source_ref.trim().is_empty() {
            StageOutcome::Fatal {
                reason: StageError::InvalidSource("empty source reference".to_string()).to_string(),
            }
        } else {
            run_stage(
                StageName::Capture,
                self.budgets.capture,
                self.capture.capture(source_ref, job_id),
                || self.capture.fallback(source_ref, job_id),
            )
            .await
        };
        let capture = self.record(report, StageName::Capture, outcome, stage_started)?;
        report.visual_ref = capture.reference;
        report.visual_label = Some(capture.label);

        // Step 2: audio extraction
        self.publish(job_id, StageName::Extract, report);
        let stage_started = Instant::now();
        let outcome = run_stage(
            StageName::Extract,
            self.budgets.extract,
            self.extractor.extract(source_ref, job_id),
            || self.extractor.fallback(source_ref, job_id),
        )
        .await;
        let audio = self.record(report, StageName::Extract, outcome, stage_started)?;
        report.audio_ref = Some(audio.reference.display().to_string());
        report.audio_duration_seconds = Some(audio.duration_seconds);

        // Step 3: transcription
        self.publish(job_id, StageName::Transcribe, report);
        let stage_started = Instant::now();
        let outcome = run_stage(
            StageName::Transcribe,
            self.budgets.transcribe,
            self.transcriber.transcribe(&audio.reference),
            || self.transcriber.fallback(),
        )
        .await;
        let transcript = self.record(report, StageName::Transcribe, outcome, stage_started)?;
        report.sentences = transcript.sentences;

        // Step 4: per-sentence authorship scoring, never fatal
        self.publish(job_id, StageName::Score, report);
        let stage_started = Instant::now();
        let (sentences, tally) = self.score_sentences(std::mem::take(&mut report.sentences)).await;
        report.sentences = sentences;

        let outcome = if tally.fallback > 0 {
            StageOutcome::Degraded {
                output: tally,
                reason: format!(
                    "{} of {} sentences used the neutral fallback",
                    tally.fallback,
                    tally.total()
                ),
            }
        } else {
            StageOutcome::Completed(tally)
        };
        self.record(report, StageName::Score, outcome, stage_started)?;

        Ok(())
    }

    /// Score every sentence, at most `scoring_concurrency` in flight, order kept
    async fn score_sentences(&self, sentences: Vec<Sentence>) -> (Vec<Sentence>, ScoringTally) {
        let budget = self.budgets.score_per_sentence;
        let scorer = &self.scorer;

        let scored: Vec<Sentence> = stream::iter(sentences.into_iter().map(|mut sentence| async move {
            let score = match timeout(budget, scorer.score(&sentence.text)).await {
                Ok(score) => score,
                Err(_) => {
                    tracing::warn!("Sentence scoring timed out after {:?}", budget);
                    AuthorshipScore::neutral(format!("timed out after {}ms", budget.as_millis()))
                }
            };

            sentence.ai_probability = Some(score.probability);
            sentence.ai_source = Some(score.source);
            sentence.ai_details = Some(score.details);
            sentence
        }))
        .buffered(self.scoring_concurrency)
        .collect()
        .await;

        let mut tally = ScoringTally::default();
        for source in scored.iter().filter_map(|s| s.ai_source) {
            tally.add(source);
        }

        (scored, tally)
    }

    /// Append the stage record and hand the output forward, or the fatal reason
    fn record<T: StageOutput>(
        &self,
        report: &mut Report,
        stage: StageName,
        outcome: StageOutcome<T>,
        stage_started: Instant,
    ) -> Result<T, String> {
        let status = outcome.status();
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record(stage, status);
        }

        let (details, result) = match outcome {
            StageOutcome::Completed(output) => (output.details(), Ok(output)),
            StageOutcome::Degraded { output, reason } => {
                let mut details = output.details();
                details.insert("reason".into(), reason.into());
                (details, Ok(output))
            }
            StageOutcome::Fatal { reason } => {
                let mut details = Details::new();
                details.insert("error".into(), reason.clone().into());
                (details, Err(format!("{} stage failed: {}", stage, reason)))
            }
        };

        report.stage_records.push(StageRecord {
            stage,
            status,
            duration_ms: elapsed_ms(stage_started),
            details,
        });

        result
    }

    fn publish(&self, job_id: JobId, stage: StageName, report: &Report) {
        tracing::info!("Job {}: {}", job_id, stage.progress_label());
        if let Err(e) = self
            .registry
            .transition(job_id, JobPatch::progress(stage, report.clone()))
        {
            tracing::debug!("Progress for job {} not published: {}", job_id, e);
        }
    }

    async fn persist(&self, report: Report) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let job_id = report.job_id;
        match tokio::task::spawn_blocking(move || store.persist(&report)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!("Failed to persist report for job {}: {}", job_id, e),
            Err(e) => tracing::error!("Persist task for job {} panicked: {}", job_id, e),
        }
    }
}

/// Apply the fallback policy to one stage attempt
async fn run_stage<T, A, F, Fut>(
    stage: StageName,
    budget: Duration,
    attempt: A,
    fallback: F,
) -> StageOutcome<T>
where
    A: Future<Output = Result<T, StageError>>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, StageError>>,
{
    let result = match timeout(budget, attempt).await {
        Ok(result) => result,
        Err(_) => Err(StageError::Timeout(budget.as_secs())),
    };

    match result {
        Ok(output) => {
            tracing::info!("Stage {} completed", stage);
            StageOutcome::Completed(output)
        }
        Err(e) if e.is_recoverable() => {
            tracing::warn!("Stage {} degraded, using fallback: {}", stage, e);
            match fallback().await {
                Ok(output) => StageOutcome::Degraded {
                    output,
                    reason: e.to_string(),
                },
                Err(fallback_err) => {
                    tracing::error!("Stage {} fallback failed: {}", stage, fallback_err);
                    StageOutcome::Fatal {
                        reason: format!("{} (fallback failed: {})", e, fallback_err),
                    }
                }
            }
        }
        Err(e) => {
            tracing::error!("Stage {} failed: {}", stage, e);
            StageOutcome::Fatal {
                reason: e.to_string(),
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
