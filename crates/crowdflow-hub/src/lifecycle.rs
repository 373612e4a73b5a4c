//! Job lifecycle: claim, run, finalize.
//!
//! A claimed job is run exactly once. The solver call is wrapped in
//! `catch_unwind` and timed; its outcome becomes the job's terminal status
//! and result payload through one conditional store update.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crowdflow_core::{
    CrowdflowError, FailureKind, Job, JobId, JobStatus, Result, SolverFailure, SolverOutput,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::registry::SolverRegistry;
use crate::store::JobStore;

/// Store writes attempted before a terminal status is given up on.
pub const FINALIZE_ATTEMPTS: u32 = 5;

const FINALIZE_BACKOFF: Duration = Duration::from_millis(50);

/// A failed run.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub detail: Option<Value>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Input, message)
    }

    /// `{status: "error", kind, message, ...detail}`
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("status".into(), json!("error"));
        payload.insert("kind".into(), json!(self.kind));
        payload.insert("message".into(), json!(self.message));
        match &self.detail {
            Some(Value::Object(detail)) => {
                for (key, value) in detail {
                    payload.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            Some(other) => {
                payload.insert("detail".into(), other.clone());
            }
            None => {}
        }
        Value::Object(payload)
    }
}

impl From<SolverFailure> for Failure {
    fn from(failure: SolverFailure) -> Self {
        Self {
            kind: failure.kind,
            message: failure.message,
            detail: failure.detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The solver's result payload.
    Success(Value),
    Failure(Failure),
}

/// What running a job produced, and how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub elapsed: Duration,
    pub verdict: Verdict,
}

impl Outcome {
    pub fn success(elapsed: Duration, result: Value) -> Self {
        Self {
            elapsed,
            verdict: Verdict::Success(result),
        }
    }

    pub fn failure(elapsed: Duration, failure: Failure) -> Self {
        Self {
            elapsed,
            verdict: Verdict::Failure(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.verdict, Verdict::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.verdict {
            Verdict::Success(_) => None,
            Verdict::Failure(failure) => Some(failure.kind),
        }
    }

    /// Terminal status the job is finalized with.
    pub fn status(&self) -> JobStatus {
        if self.is_success() {
            JobStatus::Finished
        } else {
            JobStatus::Failed
        }
    }

    /// Result payload stored on the job.
    pub fn payload(&self) -> Value {
        match &self.verdict {
            Verdict::Success(result) => json!({ "status": "success", "result": result }),
            Verdict::Failure(failure) => failure.to_payload(),
        }
    }
}

/// Claims, runs and finalizes jobs against one store and registry.
pub struct JobLifecycleManager {
    store: Arc<dyn JobStore>,
    registry: Arc<SolverRegistry>,
    in_flight: Mutex<HashSet<JobId>>,
    solve_timeout: Option<Duration>,
}

impl JobLifecycleManager {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<SolverRegistry>) -> Self {
        Self {
            store,
            registry,
            in_flight: Mutex::new(HashSet::new()),
            solve_timeout: None,
        }
    }

    /// Deadline applied by [`process`](Self::process).
    pub fn with_solve_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.solve_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SolverRegistry> {
        &self.registry
    }

    /// Jobs claimed through this manager and not yet finalized.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Atomically claims the oldest queued job.
    ///
    /// A job already in flight in this process is a concurrency violation;
    /// only the second claimant fails.
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        let Some(job) = self.store.claim_next().await? else {
            return Ok(None);
        };
        if !self.in_flight.lock().insert(job.id) {
            error!(job_id = job.id.0, "job handed out twice");
            return Err(CrowdflowError::ConcurrencyViolation(job.id));
        }
        info!(job_id = job.id.0, solver = %job.solver, "claimed job");
        Ok(Some(job))
    }

    /// Runs the job's solver on the calling thread.
    pub fn run(&self, job: &Job) -> Outcome {
        execute(&self.registry, job)
    }

    /// Records the outcome as the job's terminal state.
    ///
    /// Returns `false`, without writing, when the job is already terminal.
    ///
    /// A failing store write is retried with doubling back-off; the job stays
    /// in flight until the last attempt.
    pub async fn finalize(&self, job: &Job, outcome: &Outcome) -> Result<bool> {
        let written = self.complete_with_retry(job, outcome).await;
        self.in_flight.lock().remove(&job.id);
        let written = written?;

        let duration_ms = outcome.elapsed.as_millis() as u64;
        if !written {
            warn!(job_id = job.id.0, "job already terminal, outcome dropped");
            return Ok(false);
        }
        match &outcome.verdict {
            Verdict::Success(_) => {
                info!(job_id = job.id.0, duration_ms, status = "finished", "job finished");
            }
            Verdict::Failure(failure) if failure.kind.is_infrastructure() => {
                error!(
                    job_id = job.id.0,
                    duration_ms,
                    status = "failed",
                    kind = %failure.kind,
                    infrastructure = true,
                    "{}",
                    failure.message
                );
            }
            Verdict::Failure(failure) => {
                warn!(
                    job_id = job.id.0,
                    duration_ms,
                    status = "failed",
                    kind = %failure.kind,
                    "{}",
                    failure.message
                );
            }
        }
        Ok(true)
    }

    async fn complete_with_retry(&self, job: &Job, outcome: &Outcome) -> Result<bool> {
        let payload = outcome.payload();
        let mut delay = FINALIZE_BACKOFF;
        let mut attempt = 1;
        loop {
            let written = self
                .store
                .complete(
                    job.id,
                    outcome.status(),
                    Some(payload.clone()),
                    Some(outcome.elapsed),
                )
                .await;
            match written {
                Ok(written) => return Ok(written),
                Err(err) if attempt < FINALIZE_ATTEMPTS => {
                    warn!(
                        job_id = job.id.0,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "terminal write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        job_id = job.id.0,
                        attempt,
                        error = %err,
                        "terminal write failed, job left in processing"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Runs the job on the blocking pool under the configured deadline,
    /// then finalizes it.
    ///
    /// On expiry the solve is abandoned and the job fails with
    /// [`FailureKind::Timeout`].
    pub async fn process(&self, job: Job) -> Result<Outcome> {
        let start = Instant::now();
        let registry = Arc::clone(&self.registry);
        let task_job = job.clone();
        let task = tokio::task::spawn_blocking(move || execute(&registry, &task_job));

        let joined = match self.solve_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    let failure = Failure::new(
                        FailureKind::Timeout,
                        format!("solve exceeded the {} ms deadline", limit.as_millis()),
                    );
                    let outcome = Outcome::failure(start.elapsed(), failure);
                    self.finalize(&job, &outcome).await?;
                    return Ok(outcome);
                }
            },
            None => task.await,
        };

        let outcome = joined.unwrap_or_else(|err| {
            Outcome::failure(
                start.elapsed(),
                Failure::new(FailureKind::Panicked, format!("solver task failed: {}", err)),
            )
        });
        self.finalize(&job, &outcome).await?;
        Ok(outcome)
    }
}

/// Resolves the solver, extracts the payload and calls the optimizer.
fn execute(registry: &SolverRegistry, job: &Job) -> Outcome {
    let start = Instant::now();
    let verdict = verdict(registry, job);
    Outcome {
        elapsed: start.elapsed(),
        verdict,
    }
}

fn verdict(registry: &SolverRegistry, job: &Job) -> Verdict {
    let solver = match registry.resolve_job(job) {
        Ok(solver) => solver,
        Err(err) => return Verdict::Failure(Failure::input(err.to_string())),
    };
    let Some(payload) = job.payload() else {
        return Verdict::Failure(Failure::input("job input has no payload"));
    };

    let optimizer = &solver.implementation;
    match panic::catch_unwind(AssertUnwindSafe(|| optimizer.optimize(payload))) {
        Ok(SolverOutput::Error(failure)) => Verdict::Failure(failure.into()),
        Ok(output) => match output.to_payload() {
            Some(result) => Verdict::Success(result),
            None => Verdict::Failure(Failure::new(
                FailureKind::Backend,
                "solver output could not be serialized",
            )),
        },
        Err(panic) => Verdict::Failure(Failure::new(
            FailureKind::Panicked,
            format!("solver '{}' panicked: {}", solver.descriptor.name, panic_message(&*panic)),
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
