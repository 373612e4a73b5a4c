//! Solver registry.
//!
//! Maps solver ids and names to descriptors and their bound [`Optimizer`]
//! implementations. The table is filled once at process start, either from
//! the built-in catalog or from configured entries bound through an
//! [`ImplementationTable`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crowdflow_config::{EngineConfig, HubConfig, SolverEntryConfig};
use crowdflow_core::{
    CrowdflowError, ImplementationRef, Job, Optimizer, Result, SolverDescriptor, SolverId,
    SolverRef,
};
use crowdflow_engine::TafweejOptimizer;
use tracing::debug;

/// A descriptor together with the capability it is bound to.
#[derive(Clone)]
pub struct RegisteredSolver {
    pub descriptor: SolverDescriptor,
    pub implementation: Arc<dyn Optimizer>,
}

impl std::fmt::Debug for RegisteredSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSolver")
            .field("descriptor", &self.descriptor)
            .field("implementation", &self.implementation.name())
            .finish()
    }
}

/// Built-in implementations addressable by [`ImplementationRef`].
#[derive(Default)]
pub struct ImplementationTable {
    entries: HashMap<ImplementationRef, Arc<dyn Optimizer>>,
}

impl ImplementationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every implementation that ships with the hub.
    pub fn builtin(engine: &EngineConfig) -> Self {
        let mut table = Self::new();
        table.insert(
            TafweejOptimizer::implementation(),
            Arc::new(TafweejOptimizer::new(engine.clone())),
        );
        table
    }

    pub fn insert(&mut self, reference: ImplementationRef, implementation: Arc<dyn Optimizer>) {
        self.entries.insert(reference, implementation);
    }

    pub fn get(&self, reference: &ImplementationRef) -> Option<Arc<dyn Optimizer>> {
        self.entries.get(reference).cloned()
    }
}

/// Id- and name-indexed solver table.
#[derive(Debug, Default)]
pub struct SolverRegistry {
    by_id: BTreeMap<SolverId, RegisteredSolver>,
    by_name: HashMap<String, SolverId>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in crowd-flow scheduling solver.
    pub fn with_builtin(engine: &EngineConfig) -> Self {
        let mut registry = Self::new();
        registry.insert(
            TafweejOptimizer::descriptor(),
            Arc::new(TafweejOptimizer::new(engine.clone())),
        );
        registry
    }

    /// Binds configured entries to implementations.
    pub fn from_catalog(
        entries: &[SolverEntryConfig],
        implementations: &ImplementationTable,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for entry in entries {
            let reference = ImplementationRef::new(
                entry.implementation.module.clone(),
                entry.implementation.entry_point.clone(),
            );
            let implementation = implementations.get(&reference).ok_or_else(|| {
                CrowdflowError::NotFound(format!(
                    "implementation {} for solver '{}'",
                    reference, entry.name
                ))
            })?;
            let mut descriptor = SolverDescriptor::new(entry.id, entry.name.clone(), reference);
            descriptor.description = entry.description.clone();
            registry.register(descriptor, implementation)?;
        }
        Ok(registry)
    }

    /// The configured catalog, or the built-in one when none is configured.
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        if config.solvers.is_empty() {
            Ok(Self::with_builtin(&config.engine))
        } else {
            Self::from_catalog(&config.solvers, &ImplementationTable::builtin(&config.engine))
        }
    }

    /// Adds an entry; ids and names must both be unused.
    pub fn register(
        &mut self,
        descriptor: SolverDescriptor,
        implementation: Arc<dyn Optimizer>,
    ) -> Result<()> {
        if self.by_id.contains_key(&descriptor.id) {
            return Err(CrowdflowError::Conflict(format!(
                "solver id {} is already registered",
                descriptor.id
            )));
        }
        if self.by_name.contains_key(&descriptor.name) {
            return Err(CrowdflowError::Conflict(format!(
                "solver name '{}' is already registered",
                descriptor.name
            )));
        }
        self.insert(descriptor, implementation);
        Ok(())
    }

    /// Indexes an entry whose id and name are known to be unused.
    fn insert(&mut self, descriptor: SolverDescriptor, implementation: Arc<dyn Optimizer>) {
        debug!(
            solver_id = descriptor.id.0,
            solver = %descriptor.name,
            implementation = %descriptor.implementation,
            "registered solver"
        );
        self.by_name.insert(descriptor.name.clone(), descriptor.id);
        self.by_id.insert(
            descriptor.id,
            RegisteredSolver {
                descriptor,
                implementation,
            },
        );
    }

    pub fn resolve(&self, reference: &SolverRef) -> Result<&RegisteredSolver> {
        let found = match reference {
            SolverRef::Id(id) => self.by_id.get(id),
            SolverRef::Name(name) => self
                .by_name
                .get(name.trim())
                .and_then(|id| self.by_id.get(id)),
        };
        found.ok_or_else(|| CrowdflowError::NotFound(format!("solver {}", reference)))
    }

    /// Solver for a job, falling back to the `optimizer_name` in its input
    /// when the job carries no solver reference.
    pub fn resolve_job(&self, job: &Job) -> Result<&RegisteredSolver> {
        if !job.solver.is_unset() {
            return self.resolve(&job.solver);
        }
        match job.optimizer_name() {
            Some(name) => self.resolve(&SolverRef::Name(name.to_string())),
            None => Err(CrowdflowError::NotFound(format!(
                "job {} names no solver",
                job.id
            ))),
        }
    }

    /// Descriptors in id order.
    pub fn descriptors(&self) -> Vec<&SolverDescriptor> {
        self.by_id.values().map(|s| &s.descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
