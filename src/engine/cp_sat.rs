//! OR-tools CP-SAT backend.
//!
//! Only linear constraints are posted: disequality and range reification are
//! big-M encodings over the variable bounds, and the max variable is a lower
//! envelope that the minimization pushes onto the true maximum.

use std::ops::Range;
use std::time::Instant;

use cp_sat::builder::{BoolVar as SatBoolVar, CpModelBuilder, IntVar as SatIntVar, LinearExpr};
use cp_sat::proto::{CpSolverStatus, SatParameters};
use tracing::info;

use super::{BoolVar, ConstraintEngine, EngineResponse, IntVar, SolveParams, SolveStatus};

pub struct CpSatEngine {
    model: CpModelBuilder,
    ints: Vec<SatIntVar>,
    bounds: Vec<(i64, i64)>,
    bools: Vec<SatBoolVar>,
    max_members: Vec<Option<Vec<IntVar>>>,
    objective: Option<IntVar>,
    has_empty_domain: bool,
}

impl CpSatEngine {
    pub fn new() -> Self {
        Self {
            model: CpModelBuilder::default(),
            ints: Vec::new(),
            bounds: Vec::new(),
            bools: Vec::new(),
            max_members: Vec::new(),
            objective: None,
            has_empty_domain: false,
        }
    }

    fn push_int(&mut self, domain: Vec<(i64, i64)>, bounds: (i64, i64)) -> IntVar {
        let var = self.model.new_int_var(domain);
        self.ints.push(var);
        self.bounds.push(bounds);
        self.max_members.push(None);
        IntVar(self.ints.len() - 1)
    }

    fn int(&self, var: IntVar) -> SatIntVar {
        self.ints[var.index()].clone()
    }

    fn linear(terms: Vec<(i64, SatIntVar)>) -> LinearExpr {
        terms.into_iter().collect()
    }

    /// Boolean equivalent to `var >= k`.
    fn reify_ge(&mut self, var: IntVar, k: i64) -> SatIntVar {
        let (lo, hi) = self.bounds[var.index()];
        let flag = SatIntVar::from(self.model.new_bool_var());
        let x = self.int(var);
        if k <= lo {
            self.model.add_eq(flag.clone(), LinearExpr::from(1));
        } else if k > hi {
            self.model.add_eq(flag.clone(), LinearExpr::from(0));
        } else {
            // flag = 1 -> x >= k
            self.model.add_ge(
                Self::linear(vec![(1, x.clone()), (-(k - lo), flag.clone())]),
                LinearExpr::from(lo),
            );
            // flag = 0 -> x <= k - 1
            self.model.add_le(
                Self::linear(vec![(1, x), (-(hi - k + 1), flag.clone())]),
                LinearExpr::from(k - 1),
            );
        }
        flag
    }
}

impl Default for CpSatEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapses sorted values into closed intervals.
fn intervals(values: &[i64]) -> Vec<(i64, i64)> {
    let mut out: Vec<(i64, i64)> = Vec::new();
    for &value in values {
        match out.last_mut() {
            Some((_, end)) if *end + 1 == value => *end = value,
            _ => out.push((value, value)),
        }
    }
    out
}

impl ConstraintEngine for CpSatEngine {
    fn new_int_var(&mut self, values: &[i64]) -> IntVar {
        let mut domain = values.to_vec();
        domain.sort_unstable();
        domain.dedup();
        match (domain.first(), domain.last()) {
            (Some(&lo), Some(&hi)) => self.push_int(intervals(&domain), (lo, hi)),
            _ => {
                self.has_empty_domain = true;
                self.push_int(vec![(0, 0)], (0, 0))
            }
        }
    }

    fn add_different(&mut self, a: IntVar, b: IntVar) {
        let (a_lo, a_hi) = self.bounds[a.index()];
        let (b_lo, b_hi) = self.bounds[b.index()];
        let big_m = (a_hi - b_lo).max(b_hi - a_lo) + 1;
        let above = SatIntVar::from(self.model.new_bool_var());
        let (x, y) = (self.int(a), self.int(b));
        // above = 1 -> a > b
        self.model.add_ge(
            Self::linear(vec![(1, x.clone()), (-1, y.clone()), (-big_m, above.clone())]),
            LinearExpr::from(1 - big_m),
        );
        // above = 0 -> b > a
        self.model.add_ge(
            Self::linear(vec![(1, y), (-1, x), (big_m, above)]),
            LinearExpr::from(1),
        );
    }

    fn add_equal(&mut self, a: IntVar, b: IntVar) {
        let (x, y) = (self.int(a), self.int(b));
        self.model.add_eq(x, y);
    }

    fn new_range_indicator(&mut self, var: IntVar, range: Range<i64>) -> BoolVar {
        let from_start = self.reify_ge(var, range.start);
        let past_end = self.reify_ge(var, range.end);
        let inside = self.model.new_bool_var();
        let flag = SatIntVar::from(inside.clone());

        self.model.add_le(flag.clone(), from_start.clone());
        self.model.add_le(
            Self::linear(vec![(1, flag.clone()), (1, past_end.clone())]),
            LinearExpr::from(1),
        );
        self.model.add_ge(
            Self::linear(vec![(1, flag), (1, past_end), (-1, from_start)]),
            LinearExpr::from(0),
        );

        self.bools.push(inside);
        BoolVar(self.bools.len() - 1)
    }

    fn add_at_most(&mut self, literals: &[BoolVar], bound: i64) {
        let sum: LinearExpr = literals
            .iter()
            .map(|literal| (1, self.bools[literal.index()].clone()))
            .collect();
        self.model.add_le(sum, LinearExpr::from(bound));
    }

    fn new_max_var(&mut self, vars: &[IntVar]) -> IntVar {
        let lo = vars.iter().map(|v| self.bounds[v.index()].0).max().unwrap_or(0);
        let hi = vars.iter().map(|v| self.bounds[v.index()].1).max().unwrap_or(0);
        let target = self.push_int(vec![(lo, hi)], (lo, hi));
        for &var in vars {
            let (t, x) = (self.int(target), self.int(var));
            self.model.add_ge(t, x);
        }
        self.max_members[target.index()] = Some(vars.to_vec());
        target
    }

    fn minimize(&mut self, objective: IntVar) {
        let target = self.int(objective);
        self.model.minimize(target);
        self.objective = Some(objective);
    }

    fn solve(&mut self, params: &SolveParams) -> EngineResponse {
        let start = Instant::now();
        if self.has_empty_domain {
            return EngineResponse::without_solution(SolveStatus::Infeasible, start.elapsed());
        }

        let mut sat = SatParameters::default();
        sat.max_time_in_seconds = Some(params.time_limit.as_secs_f64());
        sat.num_search_workers = Some(params.num_search_workers);
        sat.random_seed = Some(params.random_seed);
        sat.log_search_progress = Some(false);

        let response = self.model.solve_with_parameters(&sat);
        let status = match response.status() {
            CpSolverStatus::Optimal => SolveStatus::Optimal,
            CpSolverStatus::Feasible => SolveStatus::Feasible,
            CpSolverStatus::Infeasible => SolveStatus::Infeasible,
            CpSolverStatus::ModelInvalid => SolveStatus::ModelInvalid,
            _ => SolveStatus::Unknown,
        };
        info!(%status, elapsed = ?start.elapsed(), "cp-sat search finished");
        if !status.has_solution() {
            return EngineResponse::without_solution(status, start.elapsed());
        }

        let mut values: Vec<i64> = self
            .ints
            .iter()
            .map(|var| var.solution_value(&response))
            .collect();
        // The target is only bounded from below; report the true maximum.
        for (index, members) in self.max_members.iter().enumerate() {
            if let Some(members) = members {
                values[index] = members
                    .iter()
                    .map(|member| values[member.index()])
                    .max()
                    .unwrap_or(0);
            }
        }
        let objective = self.objective.map(|var| values[var.index()]);
        EngineResponse {
            status,
            values,
            objective,
            wall_time: start.elapsed(),
        }
    }

    fn name(&self) -> &'static str {
        "cp-sat"
    }
}
