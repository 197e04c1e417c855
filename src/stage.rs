// src/stage.rs
// Stage vocabulary shared by the adapters and the orchestrator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Stage-specific telemetry attached to a [`StageRecord`]
pub type Details = BTreeMap<String, Scalar>;

/// Scalar value allowed inside stage details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Flag(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Scalar::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        Scalar::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// The four pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Capture,
    Extract,
    Transcribe,
    Score,
}

impl StageName {
    pub const ALL: [StageName; 4] = [
        StageName::Capture,
        StageName::Extract,
        StageName::Transcribe,
        StageName::Score,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Capture => "capture",
            StageName::Extract => "extract",
            StageName::Transcribe => "transcribe",
            StageName::Score => "score",
        }
    }

    /// 1-based position in the pipeline
    pub fn position(self) -> usize {
        match self {
            StageName::Capture => 1,
            StageName::Extract => 2,
            StageName::Transcribe => 3,
            StageName::Score => 4,
        }
    }

    pub fn progress_label(self) -> String {
        let action = match self {
            StageName::Capture => "Capturing screenshot",
            StageName::Extract => "Extracting audio",
            StageName::Transcribe => "Transcribing audio",
            StageName::Score => "Running AI detection",
        };
        format!("{} ({}/{})", action, self.position(), StageName::ALL.len())
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Degraded,
    Failed,
}

/// One attempted stage inside a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageName,
    pub status: StageStatus,
    pub duration_ms: u64,
    pub details: Details,
}

/// Stage adapter errors with recoverability classification
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("{0} is not configured")]
    Unconfigured(String),

    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid source reference: {0}")]
    InvalidSource(String),

    #[error("Capture target unreachable: {0}")]
    Unreachable(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl StageError {
    /// Returns true if the stage can substitute its fallback output
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StageError::Unconfigured(_)
                | StageError::ToolUnavailable(_)
                | StageError::Timeout(_)
                | StageError::Network(_)
                | StageError::Provider(_)
                | StageError::MissingInput(_)
        )
    }
}

/// Result of running one stage under the fallback policy
#[derive(Debug)]
pub enum StageOutcome<T> {
    Completed(T),
    Degraded { output: T, reason: String },
    Fatal { reason: String },
}

impl<T> StageOutcome<T> {
    pub fn status(&self) -> StageStatus {
        match self {
            StageOutcome::Completed(_) => StageStatus::Completed,
            StageOutcome::Degraded { .. } => StageStatus::Degraded,
            StageOutcome::Fatal { .. } => StageStatus::Failed,
        }
    }
}

/// Stage output that can describe itself in a stage record
pub trait StageOutput {
    fn details(&self) -> Details;
}
