//! Job persistence.
//!
//! [`JobStore`] is the only synchronization point shared between workers.
//! Claiming is a single atomic conditional transition in every
//! implementation, so two claimers never receive the same job.

mod memory;
mod sqlite;

#[cfg(test)]
mod store_tests;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crowdflow_config::StoreConfig;
use crowdflow_core::{CrowdflowError, Job, JobId, JobStatus, JobSubmission, Result};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

/// Storage-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job {job_id} has a corrupt {column} column: {message}")]
    Corrupt {
        job_id: i64,
        column: &'static str,
        message: String,
    },

    #[error("{} is not a terminal status", .0.as_str())]
    NotTerminal(JobStatus),

    #[error("could not encode job field: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for CrowdflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotTerminal(_) => CrowdflowError::Internal(err.to_string()),
            other => CrowdflowError::Store(other.to_string()),
        }
    }
}

/// Persistence contract for jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Creates a queued job.
    async fn submit(&self, submission: JobSubmission) -> Result<Job>;

    async fn get(&self, id: JobId) -> Result<Option<Job>>;

    /// Atomically moves the oldest queued job to processing and returns it.
    async fn claim_next(&self) -> Result<Option<Job>>;

    /// Moves a processing job to `status`, which must be terminal.
    ///
    /// Returns `false` when the job was not processing, which makes repeated
    /// completion a no-op.
    async fn complete(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<Value>,
        time_to_solve: Option<Duration>,
    ) -> Result<bool>;

    /// Jobs in id order, optionally filtered by status.
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>>;
}

/// Opens the store named by `config`, creating its schema when needed.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn JobStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryJobStore::new())),
        StoreConfig::Sqlite {
            url,
            max_connections,
        } => {
            let store = SqliteJobStore::connect(url, *max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}

fn ensure_terminal(status: JobStatus) -> std::result::Result<(), StoreError> {
    if status.is_terminal() {
        Ok(())
    } else {
        Err(StoreError::NotTerminal(status))
    }
}
