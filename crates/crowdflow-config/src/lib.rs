//! Configuration system for Crowdflow.
//!
//! Load hub configuration from TOML or YAML files to control the job store,
//! the worker pool, the scheduling engine and the solver catalog without
//! code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use crowdflow_config::{DispatchPreference, HubConfig, StoreConfig};
//! use std::time::Duration;
//!
//! let config = HubConfig::from_toml_str(r#"
//!     [store]
//!     type = "sqlite"
//!     url = "sqlite://jobs.db"
//!
//!     [worker]
//!     worker_count = 4
//!     poll_interval_ms = 250
//!     solve_timeout_secs = 120
//!
//!     [engine]
//!     dispatch_preference = "earliest"
//!     diagnose_infeasibility = true
//!
//!     [[solvers]]
//!     id = 1
//!     name = "tafweej_scheduling"
//!     implementation = { module = "crowdflow_engine", entry_point = "TafweejOptimizer" }
//! "#).unwrap();
//!
//! assert_eq!(config.worker.poll_interval(), Duration::from_millis(250));
//! assert_eq!(config.worker.solve_timeout(), Some(Duration::from_secs(120)));
//! assert_eq!(config.engine.dispatch_preference, DispatchPreference::Earliest);
//! assert!(matches!(config.store, StoreConfig::Sqlite { .. }));
//! assert_eq!(config.solvers.len(), 1);
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use crowdflow_config::HubConfig;
//!
//! let config = HubConfig::load("crowdflow.toml").unwrap_or_default();
//! // Proceeds with defaults if file doesn't exist
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of polling workers.
pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Default pause between polls when the queue is empty.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default cap on re-solves spent building a conflict report.
pub const DEFAULT_MAX_CONFLICT_PROBES: usize = 500;

/// Default SQLite pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main hub configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HubConfig {
    /// Job store backend.
    #[serde(default)]
    pub store: StoreConfig,

    /// Worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Scheduling engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Solver catalog. Empty means the built-in catalog.
    #[serde(default)]
    pub solvers: Vec<SolverEntryConfig>,
}

impl HubConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file, picking the format by extension.
    ///
    /// `.yaml`/`.yml` files are parsed as YAML, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, fails to parse, or fails
    /// [`HubConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path)?,
            _ => Self::from_toml_file(path)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Sets the job store.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Sets the number of polling workers.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker.worker_count = count;
        self
    }

    /// Sets the per-job solve deadline.
    pub fn with_solve_timeout_secs(mut self, seconds: u64) -> Self {
        self.worker.solve_timeout_secs = Some(seconds);
        self
    }

    /// Adds a solver catalog entry.
    pub fn with_solver(mut self, solver: SolverEntryConfig) -> Self {
        self.solvers.push(solver);
        self
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.worker_count == 0 {
            return Err(ConfigError::Invalid("worker_count must be at least 1".into()));
        }
        if self.worker.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.worker.solve_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("solve_timeout_secs must be positive".into()));
        }
        if let StoreConfig::Sqlite {
            max_connections, ..
        } = &self.store
        {
            if *max_connections == 0 {
                return Err(ConfigError::Invalid("max_connections must be at least 1".into()));
            }
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for solver in &self.solvers {
            if !ids.insert(solver.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate solver id {}",
                    solver.id
                )));
            }
            if !names.insert(solver.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate solver name '{}'",
                    solver.name
                )));
            }
        }
        Ok(())
    }
}

/// Job store backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local table; jobs are lost on exit.
    #[default]
    Memory,

    /// SQLite database reached through a connection pool.
    Sqlite {
        /// Connection URL, e.g. `sqlite://jobs.db` or `sqlite::memory:`.
        url: String,

        /// Pool size.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Number of independent polling workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Pause between polls when no job is queued.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deadline for one job; expiry fails the job with a timeout.
    #[serde(default)]
    pub solve_timeout_secs: Option<u64>,
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            solve_timeout_secs: None,
        }
    }
}

impl WorkerConfig {
    /// Returns the poll interval as a Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the solve deadline as a Duration, if any.
    pub fn solve_timeout(&self) -> Option<Duration> {
        self.solve_timeout_secs.map(Duration::from_secs)
    }
}

/// Which dispatch tick the first round settles on when several are optimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPreference {
    /// Prefer the earliest tick for every group.
    #[default]
    Earliest,

    /// Leave the choice to the backend.
    Unconstrained,
}

/// Scheduling engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Tie-break between equally good dispatch ticks.
    #[serde(default)]
    pub dispatch_preference: DispatchPreference,

    /// Compute a conflicting-constraint report when a round is infeasible.
    #[serde(default)]
    pub diagnose_infeasibility: bool,

    /// Maximum re-solves spent on one conflict report.
    #[serde(default = "default_max_conflict_probes")]
    pub max_conflict_probes: usize,
}

fn default_max_conflict_probes() -> usize {
    DEFAULT_MAX_CONFLICT_PROBES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch_preference: DispatchPreference::default(),
            diagnose_infeasibility: false,
            max_conflict_probes: DEFAULT_MAX_CONFLICT_PROBES,
        }
    }
}

impl EngineConfig {
    /// Enables conflict reports on infeasibility.
    pub fn with_diagnostics(mut self) -> Self {
        self.diagnose_infeasibility = true;
        self
    }

    /// Sets the dispatch tie-break.
    pub fn with_dispatch_preference(mut self, preference: DispatchPreference) -> Self {
        self.dispatch_preference = preference;
        self
    }
}

/// One solver catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SolverEntryConfig {
    /// Registry identifier.
    pub id: i64,

    /// Unique human-readable name.
    pub name: String,

    /// Optional description shown in listings.
    #[serde(default)]
    pub description: Option<String>,

    /// Implementation the entry is bound to.
    pub implementation: ImplementationConfig,
}

/// Names a built-in implementation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ImplementationConfig {
    pub module: String,
    pub entry_point: String,
}
