use crate::orchestrator::Report;
use crate::stage::{StageName, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = Uuid;

pub const INITIAL_PROGRESS: &str = "Starting analysis...";
pub const COMPLETED_PROGRESS: &str = "Analysis completed";
pub const FAILED_PROGRESS: &str = "Analysis failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

/// Why a job failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub message: String,
    pub completed_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub source_ref: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress_label: String,
    pub result: Option<Report>,
    pub error: Option<JobFailure>,
}

impl Job {
    pub fn new(source_ref: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_ref: source_ref.to_string(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            completed_at: None,
            progress_label: INITIAL_PROGRESS.to_string(),
            result: None,
            error: None,
        }
    }
}

/// Partial update merged atomically into a job
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress_label: Option<String>,
    pub result: Option<Report>,
    pub error: Option<JobFailure>,
}

impl JobPatch {
    pub fn running() -> Self {
        Self {
            status: Some(JobStatus::Running),
            ..Self::default()
        }
    }

    /// Progress label plus the partial report before a stage starts
    pub fn progress(stage: StageName, partial: Report) -> Self {
        Self {
            progress_label: Some(stage.progress_label()),
            result: Some(partial),
            ..Self::default()
        }
    }

    pub fn completed(report: Report) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress_label: Some(COMPLETED_PROGRESS.to_string()),
            result: Some(report),
            error: None,
        }
    }

    pub fn failed(failure: JobFailure, partial: Report) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            progress_label: Some(FAILED_PROGRESS.to_string()),
            result: Some(partial),
            error: Some(failure),
        }
    }
}

/// Reason a report cannot back a completed job
pub(crate) fn completion_defect(report: Option<&Report>) -> Option<String> {
    let Some(report) = report else {
        return Some("completed job requires a report".to_string());
    };
    if report.stage_records.len() != StageName::ALL.len() {
        return Some(format!(
            "completed job requires {} stage records, got {}",
            StageName::ALL.len(),
            report.stage_records.len()
        ));
    }
    if report.has_failed_stage() {
        return Some("completed job cannot contain a failed stage".to_string());
    }
    None
}

/// Reason a patch cannot back a failed job
pub(crate) fn failure_defect(error: Option<&JobFailure>, report: Option<&Report>) -> Option<String> {
    if error.is_none() {
        return Some("failed job requires an error".to_string());
    }
    let Some(report) = report else {
        return Some("failed job requires a report".to_string());
    };
    let failed = report
        .stage_records
        .iter()
        .filter(|r| r.status == StageStatus::Failed)
        .count();
    let trailing = report
        .stage_records
        .last()
        .map(|r| r.status == StageStatus::Failed)
        .unwrap_or(false);
    if failed != 1 || !trailing {
        return Some("failed report must end with exactly one failed stage".to_string());
    }
    None
}
