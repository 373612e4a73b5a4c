//! Polling worker pool.
//!
//! Each worker loops: claim the next queued job, process it, repeat. With no
//! work it sleeps for the poll interval; a store error is logged and the
//! worker backs off instead of exiting. Cancellation is observed between
//! jobs, so a job in flight always finishes and is finalized.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crowdflow_config::WorkerConfig;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::lifecycle::JobLifecycleManager;

/// Upper bound on the back-off after repeated store errors.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Counters shared by every worker of a pool.
#[derive(Debug, Default)]
pub struct WorkerStats {
    claimed: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub claimed: u64,
    pub finished: u64,
    pub failed: u64,
    pub errors: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            claimed: self.claimed.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Independent workers sharing one lifecycle manager.
pub struct WorkerPool {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl WorkerPool {
    /// Starts `config.worker_count` workers on the current tokio runtime.
    pub fn spawn(
        manager: Arc<JobLifecycleManager>,
        config: &WorkerConfig,
        token: CancellationToken,
    ) -> Self {
        let stats = Arc::new(WorkerStats::default());
        let handles = (0..config.worker_count.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&manager),
                    config.poll_interval(),
                    token.clone(),
                    Arc::clone(&stats),
                ))
            })
            .collect();
        info!(
            workers = config.worker_count.max(1),
            poll_interval_ms = config.poll_interval_ms,
            store = manager.store().name(),
            "worker pool started"
        );
        Self {
            token,
            handles,
            stats,
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels the pool and waits for every worker to finish its current job.
    pub async fn shutdown(self) -> WorkerStatsSnapshot {
        self.token.cancel();
        self.join().await
    }

    /// Waits for every worker to stop, e.g. after the token was cancelled elsewhere.
    pub async fn join(self) -> WorkerStatsSnapshot {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "worker task ended abnormally");
            }
        }
        let stats = self.stats.snapshot();
        info!(
            claimed = stats.claimed,
            finished = stats.finished,
            failed = stats.failed,
            errors = stats.errors,
            "worker pool stopped"
        );
        stats
    }
}

async fn worker_loop(
    worker: usize,
    manager: Arc<JobLifecycleManager>,
    poll_interval: Duration,
    token: CancellationToken,
    stats: Arc<WorkerStats>,
) {
    debug!(worker, "worker started");
    let mut backoff = poll_interval;

    while !token.is_cancelled() {
        match manager.claim_next().await {
            Ok(Some(job)) => {
                backoff = poll_interval;
                stats.claimed.fetch_add(1, Ordering::Relaxed);
                let job_id = job.id;
                match manager.process(job).await {
                    Ok(outcome) if outcome.is_success() => {
                        stats.finished.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(_) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        stats.errors.fetch_add(1, Ordering::Relaxed);
                        error!(worker, job_id = job_id.0, error = %err, "could not finalize job");
                    }
                }
            }
            Ok(None) => {
                backoff = poll_interval;
                if sleep_or_cancel(&token, poll_interval).await {
                    break;
                }
            }
            Err(err) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(worker, error = %err, backoff_ms = backoff.as_millis() as u64, "claim failed");
                if sleep_or_cancel(&token, backoff).await {
                    break;
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
    debug!(worker, "worker stopped");
}

/// Returns `true` when cancelled before the delay elapsed.
async fn sleep_or_cancel(token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
