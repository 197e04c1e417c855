use crate::jobs::JobId;
use crate::stage::{StageRecord, StageStatus};
use crate::stt::Sentence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Analysis report, partial while the job runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub job_id: JobId,
    pub source_ref: String,
    pub timestamp: DateTime<Utc>,
    pub visual_ref: Option<String>,
    pub visual_label: Option<String>,
    pub audio_ref: Option<String>,
    pub audio_duration_seconds: Option<f64>,
    pub sentences: Vec<Sentence>,
    pub stage_records: Vec<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl Report {
    pub fn new(job_id: JobId, source_ref: &str) -> Self {
        Self {
            job_id,
            source_ref: source_ref.to_string(),
            timestamp: Utc::now(),
            visual_ref: None,
            visual_label: None,
            audio_ref: None,
            audio_duration_seconds: None,
            sentences: Vec::new(),
            stage_records: Vec::new(),
            summary: None,
        }
    }

    /// Stages that finished without a fatal failure
    pub fn completed_steps(&self) -> usize {
        self.stage_records
            .iter()
            .filter(|r| r.status != StageStatus::Failed)
            .count()
    }

    pub fn has_failed_stage(&self) -> bool {
        self.stage_records
            .iter()
            .any(|r| r.status == StageStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_duration_ms: u64,
    pub sentence_count: usize,
    pub mean_ai_probability: f64,
    pub status: SummaryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_steps: Option<usize>,
}

impl Summary {
    pub fn completed(total_duration_ms: u64, sentences: &[Sentence]) -> Self {
        Self {
            total_duration_ms,
            sentence_count: sentences.len(),
            mean_ai_probability: mean_ai_probability(sentences),
            status: SummaryStatus::Completed,
            completed_at: Some(Utc::now()),
            failed_at: None,
            error: None,
            completed_steps: None,
        }
    }

    pub fn failed(
        total_duration_ms: u64,
        sentences: &[Sentence],
        error: &str,
        completed_steps: usize,
    ) -> Self {
        Self {
            total_duration_ms,
            sentence_count: sentences.len(),
            mean_ai_probability: mean_ai_probability(sentences),
            status: SummaryStatus::Failed,
            completed_at: None,
            failed_at: Some(Utc::now()),
            error: Some(error.to_string()),
            completed_steps: Some(completed_steps),
        }
    }
}

/// Mean over scored sentences; 0 when nothing was scored
pub fn mean_ai_probability(sentences: &[Sentence]) -> f64 {
    let scored: Vec<f64> = sentences.iter().filter_map(|s| s.ai_probability).collect();
    if scored.is_empty() {
        0.0
    } else {
        scored.iter().sum::<f64>() / scored.len() as f64
    }
}
