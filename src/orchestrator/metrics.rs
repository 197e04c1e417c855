use crate::stage::{StageName, StageStatus};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub completed: u64,
    pub degraded: u64,
    pub failed: u64,
}

impl StageCounts {
    pub fn total(&self) -> u64 {
        self.completed + self.degraded + self.failed
    }
}

/// Per-stage outcome counters
#[derive(Debug, Default)]
pub struct StageMetrics {
    counts: BTreeMap<StageName, StageCounts>,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: StageName, status: StageStatus) {
        let counts = self.counts.entry(stage).or_default();
        match status {
            StageStatus::Completed => counts.completed += 1,
            StageStatus::Degraded => counts.degraded += 1,
            StageStatus::Failed => counts.failed += 1,
        }
    }

    pub fn get(&self, stage: StageName) -> StageCounts {
        self.counts.get(&stage).copied().unwrap_or_default()
    }

    /// Counts for every stage, keyed by stage name
    pub fn snapshot(&self) -> BTreeMap<&'static str, StageCounts> {
        StageName::ALL
            .iter()
            .map(|stage| (stage.as_str(), self.get(*stage)))
            .collect()
    }
}
