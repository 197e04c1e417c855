// src/capture/mod.rs
// Visual capture stage: page screenshot + title

mod chrome;

pub use chrome::ChromeCapture;

use crate::jobs::JobId;
use crate::stage::{Details, StageError, StageOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Video";

/// Output of the capture stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutput {
    /// Public path of the screenshot, if one was produced
    pub reference: Option<String>,
    /// Page title
    pub label: String,
    /// Time spent inside the capture tool
    pub duration_ms: u64,
}

impl CaptureOutput {
    pub fn placeholder() -> Self {
        Self {
            reference: None,
            label: UNKNOWN_TITLE.to_string(),
            duration_ms: 0,
        }
    }
}

impl StageOutput for CaptureOutput {
    fn details(&self) -> Details {
        let mut details = Details::new();
        details.insert("title".into(), self.label.clone().into());
        if let Some(reference) = &self.reference {
            details.insert("path".into(), reference.clone().into());
        }
        details.insert("tool_duration_ms".into(), self.duration_ms.into());
        details
    }
}

/// Visual capture adapter
#[async_trait]
pub trait VisualCapture: Send + Sync {
    async fn capture(&self, source_ref: &str, job_id: JobId) -> Result<CaptureOutput, StageError>;

    /// Deterministic output used when capture fails recoverably
    async fn fallback(&self, _source_ref: &str, _job_id: JobId) -> Result<CaptureOutput, StageError> {
        Ok(CaptureOutput::placeholder())
    }

    fn name(&self) -> &str;
}
