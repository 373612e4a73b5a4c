//! Process-local job store.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use crowdflow_core::{Job, JobId, JobStatus, JobSubmission, Result};
use parking_lot::Mutex;
use serde_json::Value;

use super::{ensure_terminal, JobStore};

#[derive(Debug, Default)]
struct JobTable {
    last_id: i64,
    jobs: BTreeMap<JobId, Job>,
}

/// Jobs held in a mutex-guarded table.
///
/// Claim and complete each run inside one critical section.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    table: Mutex<JobTable>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn submit(&self, submission: JobSubmission) -> Result<Job> {
        let mut table = self.table.lock();
        table.last_id += 1;
        let job = Job::queued(JobId(table.last_id), submission, Utc::now());
        table.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.table.lock().jobs.get(&id).cloned())
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        let mut table = self.table.lock();
        let next = table
            .jobs
            .values_mut()
            .find(|job| job.status == JobStatus::Queued);
        Ok(next.map(|job| {
            job.status = JobStatus::Processing;
            job.updated_at = Utc::now();
            job.clone()
        }))
    }

    async fn complete(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<Value>,
        time_to_solve: Option<Duration>,
    ) -> Result<bool> {
        ensure_terminal(status)?;
        let mut table = self.table.lock();
        match table.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Processing => {
                job.status = status;
                job.result = result;
                job.time_to_solve = time_to_solve;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let table = self.table.lock();
        Ok(table
            .jobs
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect())
    }
}
