// src/storage.rs
// Write-once persistence of final reports

use crate::jobs::JobId;
use crate::orchestrator::Report;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Report for job {0} was already persisted")]
    AlreadyPersisted(JobId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, job_id: JobId) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }

    /// Write `report` as pretty JSON; a second write for the same job fails
    pub fn persist(&self, report: &Report) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.dir)?;

        let content = serde_json::to_string_pretty(report)?;
        let path = self.path_for(report.job_id);

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyPersisted(report.job_id));
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        tracing::info!("Results saved: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("results"));
        let report = Report::new(uuid::Uuid::new_v4(), "https://youtu.be/abc");

        let path = store.persist(&report).unwrap();
        let saved: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, report);

        let err = store.persist(&report).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyPersisted(id) if id == report.job_id));
    }

    #[test]
    fn test_path_layout() {
        let store = ReportStore::new("/data/results");
        let id = uuid::Uuid::nil();
        assert_eq!(
            store.path_for(id),
            PathBuf::from("/data/results/00000000-0000-0000-0000-000000000000.json")
        );
    }
}
