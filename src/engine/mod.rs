//! Narrow interface to a constraint-optimization engine.
//!
//! The exam model needs exactly these primitives: finite-domain integer
//! variables, equality and disequality between them, booleans reified on
//! range membership, an upper bound on a sum of booleans, a max-aggregated
//! variable, and minimization under a time budget. Any engine implementing
//! [`ConstraintEngine`] can run the model.

pub mod native;

#[cfg(feature = "cp-sat")]
pub mod cp_sat;

use std::ops::Range;
use std::time::Duration;

use crate::config::{EngineKind, SchedulerConfig};
use crate::error::SolveError;

/// Handle to an integer variable, valid only for the engine that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntVar(usize);

impl IntVar {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a boolean variable, valid only for the engine that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoolVar(usize);

impl BoolVar {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Search limits handed to [`ConstraintEngine::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolveParams {
    pub time_limit: Duration,
    pub num_search_workers: i32,
    pub random_seed: i32,
    pub check_interval: u64,
}

impl SolveParams {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            time_limit: config.time_limit(),
            num_search_workers: config.num_search_workers,
            random_seed: config.random_seed,
            check_interval: config.check_interval,
        }
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }
}

impl Default for SolveParams {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// A solution was found and proven optimal.
    Optimal,
    /// A solution was found, optimality not proven within the budget.
    Feasible,
    /// No solution exists.
    Infeasible,
    /// The budget ran out before any solution was found.
    Unknown,
    /// The model uses a primitive the engine can't express.
    ModelInvalid,
}

impl SolveStatus {
    #[inline]
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unknown => "unknown",
            SolveStatus::ModelInvalid => "model invalid",
        };
        f.write_str(name)
    }
}

/// What an engine returns from a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub status: SolveStatus,
    /// Value of every integer variable, indexed by [`IntVar::index`].
    /// Empty unless `status.has_solution()`.
    pub values: Vec<i64>,
    pub objective: Option<i64>,
    pub wall_time: Duration,
}

impl EngineResponse {
    pub fn without_solution(status: SolveStatus, wall_time: Duration) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: None,
            wall_time,
        }
    }

    #[inline]
    pub fn value(&self, var: IntVar) -> Option<i64> {
        self.values.get(var.index()).copied()
    }
}

/// The primitives a constraint-optimization engine must provide.
pub trait ConstraintEngine {
    /// Integer variable whose domain is exactly `values`.
    fn new_int_var(&mut self, values: &[i64]) -> IntVar;

    fn add_different(&mut self, a: IntVar, b: IntVar);

    fn add_equal(&mut self, a: IntVar, b: IntVar);

    /// Boolean that is true iff `range.start <= var < range.end`.
    fn new_range_indicator(&mut self, var: IntVar, range: Range<i64>) -> BoolVar;

    /// At most `bound` of `literals` are true.
    fn add_at_most(&mut self, literals: &[BoolVar], bound: i64);

    /// Integer variable equal to the maximum of `vars` (0 when empty).
    fn new_max_var(&mut self, vars: &[IntVar]) -> IntVar;

    fn minimize(&mut self, objective: IntVar);

    fn solve(&mut self, params: &SolveParams) -> EngineResponse;

    fn name(&self) -> &'static str;
}

/// Creates a fresh engine of the requested kind.
pub fn create_engine(kind: EngineKind) -> Result<Box<dyn ConstraintEngine>, SolveError> {
    match kind {
        EngineKind::Native => Ok(Box::new(native::NativeEngine::new())),
        #[cfg(feature = "cp-sat")]
        EngineKind::CpSat => Ok(Box::new(cp_sat::CpSatEngine::new())),
        #[cfg(not(feature = "cp-sat"))]
        EngineKind::CpSat => Err(SolveError::EngineUnavailable(kind.name())),
    }
}
