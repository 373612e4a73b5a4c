//! Test utilities for crowdflow-hub
//!
//! Small optimizers with predictable behavior, a registry holding them, and
//! a store that misbehaves on purpose.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crowdflow_config::EngineConfig;
use crowdflow_core::{
    CrowdflowError, FailureKind, ImplementationRef, Job, JobId, JobStatus, JobSubmission,
    Optimizer, Result, SolverDescriptor, SolverFailure, SolverOutput,
};
use crowdflow_test::jobs::{ECHO_ID, ECHO_NAME};
use parking_lot::Mutex;
use serde_json::Value;

use crate::registry::SolverRegistry;
use crate::store::{JobStore, MemoryJobStore};

pub const PANIC_ID: i64 = 43;
pub const SLEEPY_ID: i64 = 44;
pub const INFEASIBLE_ID: i64 = 45;

/// Returns its payload unchanged.
pub struct EchoOptimizer;

impl Optimizer for EchoOptimizer {
    fn name(&self) -> &str {
        ECHO_NAME
    }

    fn optimize(&self, input: &Value) -> SolverOutput {
        SolverOutput::Generic(input.clone())
    }
}

/// Always panics.
pub struct PanickingOptimizer;

impl Optimizer for PanickingOptimizer {
    fn name(&self) -> &str {
        "panics"
    }

    fn optimize(&self, _input: &Value) -> SolverOutput {
        panic!("solver exploded")
    }
}

/// Sleeps, then echoes.
pub struct SleepyOptimizer(pub Duration);

impl Optimizer for SleepyOptimizer {
    fn name(&self) -> &str {
        "sleepy"
    }

    fn optimize(&self, input: &Value) -> SolverOutput {
        std::thread::sleep(self.0);
        SolverOutput::Generic(input.clone())
    }
}

/// Reports an infeasible model with structured detail.
pub struct InfeasibleOptimizer;

impl Optimizer for InfeasibleOptimizer {
    fn name(&self) -> &str {
        "infeasible"
    }

    fn optimize(&self, _input: &Value) -> SolverOutput {
        SolverOutput::Error(
            SolverFailure::new(FailureKind::Infeasible, "no feasible schedule")
                .with_detail(serde_json::json!({ "round": 2, "dispatch_ticks": [1] })),
        )
    }
}

fn descriptor(id: i64, name: &str) -> SolverDescriptor {
    SolverDescriptor::new(id, name, ImplementationRef::new("crowdflow_hub::test_utils", name))
}

/// Built-in catalog plus every test optimizer.
pub fn test_registry() -> SolverRegistry {
    let mut registry = SolverRegistry::with_builtin(&EngineConfig::default());
    registry
        .register(descriptor(ECHO_ID, ECHO_NAME), Arc::new(EchoOptimizer))
        .unwrap();
    registry
        .register(descriptor(PANIC_ID, "panics"), Arc::new(PanickingOptimizer))
        .unwrap();
    registry
        .register(
            descriptor(SLEEPY_ID, "sleepy"),
            Arc::new(SleepyOptimizer(Duration::from_millis(500))),
        )
        .unwrap();
    registry
        .register(descriptor(INFEASIBLE_ID, "infeasible"), Arc::new(InfeasibleOptimizer))
        .unwrap();
    registry
}

/// Hands every claimed job out twice.
#[derive(Default)]
pub struct DuplicatingStore {
    inner: MemoryJobStore,
    repeat: Mutex<Option<Job>>,
}

#[async_trait]
impl JobStore for DuplicatingStore {
    fn name(&self) -> &'static str {
        "duplicating"
    }

    async fn submit(&self, submission: JobSubmission) -> Result<Job> {
        self.inner.submit(submission).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        self.inner.get(id).await
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        if let Some(job) = self.repeat.lock().take() {
            return Ok(Some(job));
        }
        let claimed = self.inner.claim_next().await?;
        *self.repeat.lock() = claimed.clone();
        Ok(claimed)
    }

    async fn complete(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<Value>,
        time_to_solve: Option<Duration>,
    ) -> Result<bool> {
        self.inner.complete(id, status, result, time_to_solve).await
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        self.inner.list(status).await
    }
}

/// Fails the first `failures` terminal writes, then behaves.
pub struct FlakyCompleteStore {
    inner: MemoryJobStore,
    failures: Mutex<usize>,
    attempts: Mutex<usize>,
}

impl FlakyCompleteStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryJobStore::new(),
            failures: Mutex::new(failures),
            attempts: Mutex::new(0),
        }
    }

    pub fn complete_attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl JobStore for FlakyCompleteStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn submit(&self, submission: JobSubmission) -> Result<Job> {
        self.inner.submit(submission).await
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        self.inner.get(id).await
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        self.inner.claim_next().await
    }

    async fn complete(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<Value>,
        time_to_solve: Option<Duration>,
    ) -> Result<bool> {
        *self.attempts.lock() += 1;
        {
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(CrowdflowError::Store("database is locked".to_string()));
            }
        }
        self.inner.complete(id, status, result, time_to_solve).await
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        self.inner.list(status).await
    }
}
