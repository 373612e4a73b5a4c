//! Jobs: the unit of work handed from submitters to workers.
//!
//! A job moves monotonically along `queued → processing → {finished, failed}`
//! and never changes once terminal.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::solver::SolverId;

/// Submission metadata that may sit next to `data` in a job input.
const ENVELOPE_KEYS: &[&str] = &["optimizer_name", "api_key"];

/// Store-assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Finished,
    Failed,
}

impl JobStatus {
    /// Returns the status as stored in the job table.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "finished" => Some(JobStatus::Finished),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Returns true once the job can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// Whether `self → next` is a legal forward transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Finished)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a solver, either by registry id or by unique name.
///
/// Deserializes from a JSON number or a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolverRef {
    Id(SolverId),
    Name(String),
}

impl SolverRef {
    /// An unset reference: id 0 or a blank name.
    pub fn is_unset(&self) -> bool {
        match self {
            SolverRef::Id(id) => id.0 == 0,
            SolverRef::Name(name) => name.trim().is_empty(),
        }
    }
}

impl From<i64> for SolverRef {
    fn from(id: i64) -> Self {
        SolverRef::Id(SolverId(id))
    }
}

impl From<&str> for SolverRef {
    fn from(name: &str) -> Self {
        SolverRef::Name(name.to_string())
    }
}

impl fmt::Display for SolverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverRef::Id(id) => write!(f, "#{}", id.0),
            SolverRef::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// What an external submitter hands to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSubmission {
    #[serde(default)]
    pub user_id: i64,
    pub solver: SolverRef,
    pub input: Value,
}

impl JobSubmission {
    pub fn new(solver: impl Into<SolverRef>, input: Value) -> Self {
        Self {
            user_id: 0,
            solver: solver.into(),
            input,
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }
}

/// A persisted job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub user_id: i64,
    pub solver: SolverRef,
    pub input: Value,
    pub status: JobStatus,
    pub result: Option<Value>,
    #[serde(with = "duration_millis", default)]
    pub time_to_solve: Option<Duration>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Builds a freshly queued job from a submission.
    pub fn queued(id: JobId, submission: JobSubmission, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: submission.user_id,
            solver: submission.solver,
            input: submission.input,
            status: JobStatus::Queued,
            result: None,
            time_to_solve: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Optimizer name carried inside the input, used when `solver` is unset.
    pub fn optimizer_name(&self) -> Option<&str> {
        self.input
            .get("optimizer_name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// The payload handed to the solver.
    ///
    /// Inputs wrapped as `{"data": ...}` yield the inner value; an object made
    /// only of envelope keys has no payload; anything else is the payload
    /// itself. Null and empty containers count as missing.
    pub fn payload(&self) -> Option<&Value> {
        let payload = match &self.input {
            Value::Object(map) => match map.get("data") {
                Some(data) => data,
                None if map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())) => return None,
                None => &self.input,
            },
            other => other,
        };
        match payload {
            Value::Null => None,
            Value::Array(items) if items.is_empty() => None,
            Value::Object(map) if map.is_empty() => None,
            other => Some(other),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
