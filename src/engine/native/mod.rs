//! Built-in branch-and-bound engine.
//!
//! Constraints are recorded as they are posted and compiled at solve time:
//! equality constraints collapse variables into classes (union-find), the
//! class domain is the intersection of its members' domains, and the search
//! branches on classes. Range indicators never become search variables, they
//! are evaluated from the class value inside the at-most constraints.

mod monitor;
mod search;
mod state;
mod stats;

pub use stats::SearchStatistics;

use std::ops::Range;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{BoolVar, ConstraintEngine, EngineResponse, IntVar, SolveParams, SolveStatus};
use monitor::TimeLimit;
use search::{CapMember, Problem, solve_components};

#[derive(Debug, Clone)]
enum VarDef {
    Decision(Vec<i64>),
    Max(Vec<IntVar>),
}

#[derive(Debug, Clone)]
struct Indicator {
    var: IntVar,
    range: Range<i64>,
}

/// Records a model and solves it with depth-first branch and bound.
#[derive(Debug, Clone, Default)]
pub struct NativeEngine {
    vars: Vec<VarDef>,
    indicators: Vec<Indicator>,
    different: Vec<(IntVar, IntVar)>,
    equal: Vec<(IntVar, IntVar)>,
    caps: Vec<(Vec<BoolVar>, i64)>,
    objective: Option<IntVar>,
    last_statistics: Option<SearchStatistics>,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics of the most recent solve.
    pub fn statistics(&self) -> Option<&SearchStatistics> {
        self.last_statistics.as_ref()
    }

    fn decision_domain(&self, var: IntVar) -> Result<&[i64], String> {
        match self.vars.get(var.index()) {
            Some(VarDef::Decision(values)) => Ok(values),
            Some(VarDef::Max(_)) => Err(format!(
                "max variable {} can only be used as the objective",
                var.index()
            )),
            None => Err(format!("unknown variable {}", var.index())),
        }
    }

    /// Lowers the recorded constraints onto equality classes.
    fn compile(&self) -> Result<Compiled, String> {
        let mut classes = UnionFind::new(self.vars.len());
        for &(a, b) in &self.equal {
            self.decision_domain(a)?;
            self.decision_domain(b)?;
            classes.union(a.index(), b.index());
        }

        // Dense class numbering over decision variables only.
        let mut class_of = vec![None; self.vars.len()];
        let mut roots = vec![None; self.vars.len()];
        let mut domains: Vec<Vec<i64>> = Vec::new();
        for (index, def) in self.vars.iter().enumerate() {
            let VarDef::Decision(values) = def else { continue };
            let root = classes.find(index);
            let class = match roots[root] {
                Some(class) => {
                    let merged: &mut Vec<i64> = &mut domains[class];
                    merged.retain(|v| values.binary_search(v).is_ok());
                    class
                }
                None => {
                    domains.push(values.clone());
                    roots[root] = Some(domains.len() - 1);
                    domains.len() - 1
                }
            };
            class_of[index] = Some(class);
        }
        let class = |var: IntVar| -> Result<usize, String> {
            class_of
                .get(var.index())
                .copied()
                .flatten()
                .ok_or_else(|| format!("variable {} is not a decision variable", var.index()))
        };

        if let Some(empty) = domains.iter().position(Vec::is_empty) {
            return Ok(Compiled::Infeasible(format!("class {empty} has an empty domain")));
        }

        let mut neighbors = vec![Vec::new(); domains.len()];
        for &(a, b) in &self.different {
            let (ca, cb) = (class(a)?, class(b)?);
            if ca == cb {
                return Ok(Compiled::Infeasible(format!(
                    "variables {} and {} are both equal and different",
                    a.index(),
                    b.index()
                )));
            }
            neighbors[ca].push(cb);
            neighbors[cb].push(ca);
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        let mut caps = Vec::with_capacity(self.caps.len());
        for (literals, bound) in &self.caps {
            if *bound < 0 {
                return Ok(Compiled::Infeasible(format!(
                    "at-most bound {bound} is negative"
                )));
            }
            let mut members = Vec::with_capacity(literals.len());
            for literal in literals {
                let indicator = self
                    .indicators
                    .get(literal.index())
                    .ok_or_else(|| format!("unknown boolean {}", literal.index()))?;
                members.push(CapMember {
                    class: class(indicator.var)?,
                    range: indicator.range.clone(),
                });
            }
            caps.push((members, *bound));
        }

        let objective = match self.objective {
            None => None,
            Some(var) => Some(match self.vars.get(var.index()) {
                Some(VarDef::Max(members)) => members
                    .iter()
                    .map(|&member| class(member))
                    .collect::<Result<Vec<_>, _>>()?,
                Some(VarDef::Decision(_)) => vec![class(var)?],
                None => return Err(format!("unknown objective variable {}", var.index())),
            }),
        };

        Ok(Compiled::Ready(Box::new(Problem::new(
            domains, neighbors, caps, objective,
        )), class_of))
    }

    fn values_from(&self, class_of: &[Option<usize>], assignment: &[i64]) -> Vec<i64> {
        let mut values = vec![0; self.vars.len()];
        for (index, def) in self.vars.iter().enumerate() {
            if let (VarDef::Decision(_), Some(class)) = (def, class_of[index]) {
                values[index] = assignment[class];
            }
        }
        for (index, def) in self.vars.iter().enumerate() {
            if let VarDef::Max(members) = def {
                values[index] = members
                    .iter()
                    .map(|member| values[member.index()])
                    .max()
                    .unwrap_or(0);
            }
        }
        values
    }
}

enum Compiled {
    Ready(Box<Problem>, Vec<Option<usize>>),
    Infeasible(String),
}

impl ConstraintEngine for NativeEngine {
    fn new_int_var(&mut self, values: &[i64]) -> IntVar {
        let mut domain = values.to_vec();
        domain.sort_unstable();
        domain.dedup();
        self.vars.push(VarDef::Decision(domain));
        IntVar(self.vars.len() - 1)
    }

    fn add_different(&mut self, a: IntVar, b: IntVar) {
        self.different.push((a, b));
    }

    fn add_equal(&mut self, a: IntVar, b: IntVar) {
        self.equal.push((a, b));
    }

    fn new_range_indicator(&mut self, var: IntVar, range: Range<i64>) -> BoolVar {
        self.indicators.push(Indicator { var, range });
        BoolVar(self.indicators.len() - 1)
    }

    fn add_at_most(&mut self, literals: &[BoolVar], bound: i64) {
        self.caps.push((literals.to_vec(), bound));
    }

    fn new_max_var(&mut self, vars: &[IntVar]) -> IntVar {
        self.vars.push(VarDef::Max(vars.to_vec()));
        IntVar(self.vars.len() - 1)
    }

    fn minimize(&mut self, objective: IntVar) {
        self.objective = Some(objective);
    }

    fn solve(&mut self, params: &SolveParams) -> EngineResponse {
        let start = Instant::now();
        let (problem, class_of) = match self.compile() {
            Ok(Compiled::Ready(problem, class_of)) => (problem, class_of),
            Ok(Compiled::Infeasible(reason)) => {
                debug!(%reason, "model infeasible before search");
                return EngineResponse::without_solution(SolveStatus::Infeasible, start.elapsed());
            }
            Err(reason) => {
                warn!(%reason, "model not supported by the native engine");
                return EngineResponse::without_solution(SolveStatus::ModelInvalid, start.elapsed());
            }
        };

        debug!(
            variables = self.vars.len(),
            classes = problem.class_count(),
            caps = self.caps.len(),
            root_lower_bound = problem.lower_bound(),
            "native search starting"
        );
        let mut monitor = TimeLimit::new(params.time_limit, params.check_interval);
        let outcome = solve_components(&problem, &mut monitor);

        info!(
            status = %outcome.status,
            objective = ?outcome.incumbent.as_ref().map(|i| i.objective),
            nodes = outcome.statistics.nodes_explored,
            backtracks = outcome.statistics.backtracks,
            solutions = outcome.statistics.solutions_found,
            elapsed = ?outcome.statistics.time_total,
            "native search finished"
        );

        let response = match &outcome.incumbent {
            Some(incumbent) if outcome.status.has_solution() => EngineResponse {
                status: outcome.status,
                values: self.values_from(&class_of, &incumbent.assignment),
                objective: self.objective.map(|_| incumbent.objective),
                wall_time: start.elapsed(),
            },
            _ => EngineResponse::without_solution(outcome.status, start.elapsed()),
        };
        self.last_statistics = Some(outcome.statistics);
        response
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
