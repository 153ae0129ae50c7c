//! In-memory job record store: one `JobRecord` per job id, mutated only
//! through these methods so `updated_at` always tracks the last write.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::model::{JobRecord, JobStatus};

#[derive(Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore").finish()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self, job_id: &str) -> JobRecord {
        let now = Utc::now();
        let record = JobRecord {
            job_id: job_id.to_string(),
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            artifacts: Default::default(),
            error: None,
        };
        self.lock().insert(job_id.to_string(), record.clone());
        record
    }

    pub fn update_status(&self, job_id: &str, status: JobStatus, error: Option<String>) {
        let mut jobs = self.lock();
        if let Some(record) = jobs.get_mut(job_id) {
            record.status = status;
            record.updated_at = Utc::now();
            if let Some(error) = error {
                record.error = Some(error);
            }
        }
    }

    pub fn add_artifact(&self, job_id: &str, name: &str, path: impl Into<String>) {
        let mut jobs = self.lock();
        if let Some(record) = jobs.get_mut(job_id) {
            record.artifacts.insert(name.to_string(), path.into());
            record.updated_at = Utc::now();
        }
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.lock().get(job_id).cloned()
    }

    pub fn all(&self) -> HashMap<String, JobRecord> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_starts_queued_with_equal_timestamps() {
        let store = JobStore::new();
        let record = store.create("job-1");
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn update_status_advances_updated_at() {
        let store = JobStore::new();
        store.create("job-1");
        store.update_status("job-1", JobStatus::Running, None);
        let record = store.get("job-1").unwrap();
        assert_eq!(record.status, JobStatus::Running);
    }

    #[test]
    fn add_artifact_records_path_by_name() {
        let store = JobStore::new();
        store.create("job-1");
        store.add_artifact("job-1", "output", "/tmp/job-1/output.mp4");
        let record = store.get("job-1").unwrap();
        assert_eq!(record.artifacts.get("output").unwrap(), "/tmp/job-1/output.mp4");
    }

    #[test]
    fn unknown_job_returns_none() {
        let store = JobStore::new();
        assert!(store.get("missing").is_none());
    }
}
