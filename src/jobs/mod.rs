// jobs/mod.rs — Process-wide job registry
//
// The outer map is write-locked only to insert; each job carries its own lock
// so transitions on different jobs never contend.

mod job;

pub use job::{
    Job, JobFailure, JobId, JobPatch, JobStatus, COMPLETED_PROGRESS, FAILED_PROGRESS,
    INITIAL_PROGRESS,
};

use job::{completion_defect, failure_defect};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Invalid transition {from:?} -> {to:?}: {reason}")]
    InvalidTransition {
        from: JobStatus,
        to: JobStatus,
        reason: String,
    },

    #[error("Job {0} is already finalized")]
    Finalized(JobId),

    #[error("Registry lock poisoned")]
    LockPoisoned,
}

/// Number of jobs per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queued job and return its id
    pub fn create(&self, source_ref: &str) -> Result<JobId, RegistryError> {
        let job = Job::new(source_ref);
        let id = job.id;

        let mut jobs = self.jobs.write().map_err(|_| RegistryError::LockPoisoned)?;
        jobs.insert(id, Arc::new(Mutex::new(job)));

        tracing::info!("Job {} queued for {}", id, source_ref);
        Ok(id)
    }

    /// Snapshot of a job
    pub fn get(&self, id: JobId) -> Result<Job, RegistryError> {
        let entry = self.entry(id)?;
        let job = entry.lock().map_err(|_| RegistryError::LockPoisoned)?;
        Ok(job.clone())
    }

    /// Merge `patch` into the job, rejecting invalid lifecycle moves
    pub fn transition(&self, id: JobId, patch: JobPatch) -> Result<Job, RegistryError> {
        let entry = self.entry(id)?;
        let mut job = entry.lock().map_err(|_| RegistryError::LockPoisoned)?;

        if job.status.is_terminal() {
            return Err(RegistryError::Finalized(id));
        }

        if let Some(next) = patch.status {
            let invalid = |reason: String| RegistryError::InvalidTransition {
                from: job.status,
                to: next,
                reason,
            };

            if !job.status.can_transition_to(next) {
                return Err(invalid("lifecycle cannot move backwards".to_string()));
            }

            let defect = match next {
                JobStatus::Completed => completion_defect(patch.result.as_ref()),
                JobStatus::Failed => failure_defect(patch.error.as_ref(), patch.result.as_ref()),
                _ => None,
            };
            if let Some(reason) = defect {
                return Err(invalid(reason));
            }
        }

        if let Some(status) = patch.status {
            job.status = status;
            if status.is_terminal() {
                job.completed_at = Some(chrono::Utc::now());
            }
        }
        if let Some(label) = patch.progress_label {
            job.progress_label = label;
        }
        if let Some(result) = patch.result {
            job.result = Some(result);
        }
        if let Some(error) = patch.error {
            job.error = Some(error);
        }

        Ok(job.clone())
    }

    pub fn status_counts(&self) -> Result<StatusCounts, RegistryError> {
        let jobs = self.jobs.read().map_err(|_| RegistryError::LockPoisoned)?;
        let mut counts = StatusCounts::default();

        for entry in jobs.values() {
            let job = entry.lock().map_err(|_| RegistryError::LockPoisoned)?;
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }

        Ok(counts)
    }

    fn entry(&self, id: JobId) -> Result<Arc<Mutex<Job>>, RegistryError> {
        let jobs = self.jobs.read().map_err(|_| RegistryError::LockPoisoned)?;
        jobs.get(&id).cloned().ok_or(RegistryError::NotFound(id))
    }
}
