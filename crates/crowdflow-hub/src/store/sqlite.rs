//! SQLite job store on an `sqlx` connection pool.
//!
//! Every operation acquires one pooled connection for the duration of the
//! call; the connection returns to the pool when it is dropped, on every exit
//! path. Claims run in an immediate transaction that rolls back on drop. JSON columns are stored as TEXT.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crowdflow_core::{Job, JobId, JobStatus, JobSubmission, Result, SolverId, SolverRef};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use super::{ensure_terminal, JobStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    job_id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          INTEGER NOT NULL,
    solver_id        INTEGER,
    solver_name      TEXT,
    input            TEXT NOT NULL,
    status           TEXT NOT NULL,
    result           TEXT,
    time_to_solve_ms INTEGER,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS jobs_status_idx ON jobs (status, job_id);
";

const COLUMNS: &str = "job_id, user_id, solver_id, solver_name, input, status, result, \
                       time_to_solve_ms, created_at, updated_at";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Jobs persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Connects to `url`, creating the database file if missing.
    ///
    /// An in-memory database lives in a single connection that is never
    /// recycled.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(StoreError::from)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(StoreError::from)?;
        debug!(url, in_memory, "connected sqlite job store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the `jobs` table and its index.
    pub async fn migrate(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        sqlx::raw_sql(SCHEMA)
            .execute(&mut *conn)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn submit(&self, submission: JobSubmission) -> Result<Job> {
        let now = Utc::now();
        let (solver_id, solver_name) = split_solver(&submission.solver);
        let input = serde_json::to_string(&submission.input).map_err(StoreError::from)?;

        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let id = sqlx::query(
            "INSERT INTO jobs (user_id, solver_id, solver_name, input, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(submission.user_id)
        .bind(solver_id)
        .bind(solver_name)
        .bind(input)
        .bind(JobStatus::Queued.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from)?
        .last_insert_rowid();

        Ok(Job::queued(JobId(id), submission, now))
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE job_id = ?", COLUMNS))
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await
            .map_err(StoreError::from)?;
        Ok(row.as_ref().map(job_from_row).transpose()?)
    }

    /// Claims inside `BEGIN IMMEDIATE`, so the write lock is taken before
    /// the queued row is selected.
    async fn claim_next(&self) -> Result<Option<Job>> {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(StoreError::from)?;
        let row = sqlx::query(&format!(
            "UPDATE jobs SET status = ?, updated_at = ?
             WHERE job_id = (SELECT job_id FROM jobs WHERE status = ? ORDER BY job_id LIMIT 1)
               AND status = ?
             RETURNING {}",
            COLUMNS
        ))
        .bind(JobStatus::Processing.as_str())
        .bind(Utc::now())
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::Queued.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?;
        let job = row.as_ref().map(job_from_row).transpose()?;
        tx.commit().await.map_err(StoreError::from)?;
        if let Some(job) = &job {
            debug!(job_id = job.id.0, "claimed queued job");
        }
        Ok(job)
    }

    async fn complete(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<Value>,
        time_to_solve: Option<Duration>,
    ) -> Result<bool> {
        ensure_terminal(status)?;
        let result = result
            .map(|v| serde_json::to_string(&v))
            .transpose()
            .map_err(StoreError::from)?;
        let millis = time_to_solve.map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));

        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let done = sqlx::query(
            "UPDATE jobs SET status = ?, result = ?, time_to_solve_ms = ?, updated_at = ?
             WHERE job_id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(result)
        .bind(millis)
        .bind(Utc::now())
        .bind(id.0)
        .bind(JobStatus::Processing.as_str())
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from)?;
        Ok(done.rows_affected() == 1)
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE ?1 IS NULL OR status = ?1 ORDER BY job_id",
            COLUMNS
        ))
        .bind(status.map(JobStatus::as_str))
        .fetch_all(&mut *conn)
        .await
        .map_err(StoreError::from)?;
        Ok(rows
            .iter()
            .map(job_from_row)
            .collect::<std::result::Result<_, _>>()?)
    }
}

fn split_solver(solver: &SolverRef) -> (Option<i64>, Option<String>) {
    match solver {
        SolverRef::Id(id) => (Some(id.0), None),
        SolverRef::Name(name) => (None, Some(name.clone())),
    }
}

fn job_from_row(row: &SqliteRow) -> std::result::Result<Job, StoreError> {
    let job_id: i64 = row.try_get("job_id")?;
    let corrupt = |column: &'static str, message: String| StoreError::Corrupt {
        job_id,
        column,
        message,
    };

    let solver = match (
        row.try_get::<Option<i64>, _>("solver_id")?,
        row.try_get::<Option<String>, _>("solver_name")?,
    ) {
        (Some(id), _) => SolverRef::Id(SolverId(id)),
        (None, Some(name)) => SolverRef::Name(name),
        (None, None) => SolverRef::Id(SolverId(0)),
    };

    let status: String = row.try_get("status")?;
    let status = JobStatus::parse(&status)
        .ok_or_else(|| corrupt("status", format!("unknown status '{}'", status)))?;

    let input: String = row.try_get("input")?;
    let input = serde_json::from_str(&input).map_err(|e| corrupt("input", e.to_string()))?;

    let result = row
        .try_get::<Option<String>, _>("result")?
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|e| corrupt("result", e.to_string()))?;

    let time_to_solve = row
        .try_get::<Option<i64>, _>("time_to_solve_ms")?
        .map(|ms| Duration::from_millis(u64::try_from(ms).unwrap_or(0)));

    Ok(Job {
        id: JobId(job_id),
        user_id: row.try_get("user_id")?,
        solver,
        input,
        status,
        result,
        time_to_solve,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
