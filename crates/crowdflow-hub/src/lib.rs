//! Crowdflow Hub - job routing for the optimization hub
//!
//! - [`registry`]: solver ids and names bound to [`Optimizer`](crowdflow_core::Optimizer) implementations
//! - [`store`]: the [`JobStore`] contract with in-memory and SQLite implementations
//! - [`lifecycle`]: claim, run under `catch_unwind`, finalize
//! - [`worker`]: a pool of polling workers with graceful shutdown

pub mod lifecycle;
pub mod registry;
pub mod store;
pub mod worker;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod lifecycle_tests;
#[cfg(test)]
mod worker_tests;

use std::sync::Arc;

use crowdflow_config::HubConfig;
use crowdflow_core::Result;

pub use lifecycle::{Failure, JobLifecycleManager, Outcome, Verdict};
pub use registry::{ImplementationTable, RegisteredSolver, SolverRegistry};
pub use store::{JobStore, MemoryJobStore, SqliteJobStore, StoreError};
pub use worker::{WorkerPool, WorkerStats, WorkerStatsSnapshot};

/// Opens the configured store and binds the solver catalog.
pub async fn connect(config: &HubConfig) -> Result<Arc<JobLifecycleManager>> {
    let store = store::open(&config.store).await?;
    let registry = Arc::new(SolverRegistry::from_config(config)?);
    Ok(Arc::new(
        JobLifecycleManager::new(store, registry).with_solve_timeout(config.worker.solve_timeout()),
    ))
}
