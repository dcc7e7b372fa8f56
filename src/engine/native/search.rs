use std::cmp::Reverse;
use std::ops::{ControlFlow, Range};

use tracing::{debug, trace};

use super::UnionFind;
use super::monitor::TimeLimit;
use super::state::SearchState;
use super::stats::SearchStatistics;
use crate::engine::SolveStatus;

/// One indicator inside an at-most constraint, lowered onto its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CapMember {
    pub class: usize,
    pub range: Range<i64>,
}

#[derive(Debug, Clone)]
struct Cap {
    members: Vec<CapMember>,
    bound: i64,
}

/// The compiled model the search runs on. All indices are class indices.
#[derive(Debug, Clone)]
pub(crate) struct Problem {
    domains: Vec<Vec<i64>>,
    neighbors: Vec<Vec<usize>>,
    caps: Vec<Cap>,
    /// (cap, member) pairs each class takes part in.
    class_caps: Vec<Vec<(usize, usize)>>,
    /// Classes aggregated by the max objective, if any.
    objective: Option<Vec<usize>>,
    /// Whether a class is capped by the incumbent bound.
    bounded: Vec<bool>,
    degree: Vec<usize>,
    lower_bound: i64,
}

impl Problem {
    pub fn new(
        domains: Vec<Vec<i64>>,
        neighbors: Vec<Vec<usize>>,
        caps: Vec<(Vec<CapMember>, i64)>,
        objective: Option<Vec<usize>>,
    ) -> Self {
        let mut class_caps = vec![Vec::new(); domains.len()];
        for (cap, (members, _)) in caps.iter().enumerate() {
            for (member, m) in members.iter().enumerate() {
                class_caps[m.class].push((cap, member));
            }
        }

        let mut bounded = vec![false; domains.len()];
        for &class in objective.iter().flatten() {
            bounded[class] = true;
        }
        let lower_bound = objective
            .iter()
            .flatten()
            .filter_map(|&class| domains[class].first().copied())
            .max()
            .unwrap_or(0)
            .max(clique_bound(&domains, &neighbors, &bounded));
        let degree = neighbors
            .iter()
            .zip(&class_caps)
            .map(|(n, c)| n.len() + c.len())
            .collect();

        Self {
            domains,
            neighbors,
            caps: caps
                .into_iter()
                .map(|(members, bound)| Cap { members, bound })
                .collect(),
            class_caps,
            objective,
            bounded,
            degree,
            lower_bound,
        }
    }

    pub fn class_count(&self) -> usize {
        self.domains.len()
    }

    pub fn lower_bound(&self) -> i64 {
        self.lower_bound
    }

    /// Groups of classes linked by a disequality or a shared cap, each
    /// ascending. Groups never constrain each other.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut links = UnionFind::new(self.domains.len());
        for (class, neighbors) in self.neighbors.iter().enumerate() {
            for &other in neighbors {
                links.union(class, other);
            }
        }
        for cap in &self.caps {
            if let Some((first, rest)) = cap.members.split_first() {
                for member in rest {
                    links.union(first.class, member.class);
                }
            }
        }

        let mut group_of_root: Vec<Option<usize>> = vec![None; self.domains.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for class in 0..self.domains.len() {
            let root = links.find(class);
            let group = match group_of_root[root] {
                Some(group) => group,
                None => {
                    groups.push(Vec::new());
                    group_of_root[root] = Some(groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[group].push(class);
        }
        groups
    }

    /// The sub-problem over `classes` (ascending, closed under
    /// [`Problem::components`]), renumbered densely in the same order.
    pub fn restrict(&self, classes: &[usize]) -> Problem {
        let mut local: Vec<Option<usize>> = vec![None; self.domains.len()];
        for (index, &class) in classes.iter().enumerate() {
            local[class] = Some(index);
        }

        let domains = classes.iter().map(|&c| self.domains[c].clone()).collect();
        let neighbors = classes
            .iter()
            .map(|&c| self.neighbors[c].iter().filter_map(|&o| local[o]).collect())
            .collect();
        let caps = self
            .caps
            .iter()
            .filter(|cap| {
                cap.members
                    .first()
                    .is_some_and(|member| local[member.class].is_some())
            })
            .map(|cap| {
                let members = cap
                    .members
                    .iter()
                    .filter_map(|member| {
                        local[member.class].map(|class| CapMember {
                            class,
                            range: member.range.clone(),
                        })
                    })
                    .collect();
                (members, cap.bound)
            })
            .collect();
        let objective = self
            .objective
            .as_ref()
            .map(|classes| classes.iter().filter_map(|&c| local[c]).collect());

        Problem::new(domains, neighbors, caps, objective)
    }

    /// Objective of a complete assignment; 0 for an empty max.
    fn objective_value(&self, assignment: &[i64]) -> Option<i64> {
        self.objective.as_ref().map(|classes| {
            classes
                .iter()
                .map(|&class| assignment[class])
                .max()
                .unwrap_or(0)
        })
    }
}

/// Bound on the max over objective classes from greedy cliques of mutually
/// different classes: `k` such classes take `k` distinct values, so the max
/// is at least the `k`-th smallest value of their joint domain.
fn clique_bound(domains: &[Vec<i64>], neighbors: &[Vec<usize>], bounded: &[bool]) -> i64 {
    let mut best = i64::MIN;
    for start in 0..domains.len() {
        if !bounded[start] {
            continue;
        }
        let mut clique = vec![start];
        for &candidate in &neighbors[start] {
            if bounded[candidate]
                && clique
                    .iter()
                    .all(|member| neighbors[candidate].binary_search(member).is_ok())
            {
                clique.push(candidate);
            }
        }
        if clique.len() < 2 {
            continue;
        }
        let mut values: Vec<i64> = clique
            .iter()
            .flat_map(|&class| domains[class].iter().copied())
            .collect();
        values.sort_unstable();
        values.dedup();
        if let Some(&kth) = values.get(clique.len() - 1) {
            best = best.max(kth);
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Incumbent {
    /// Value per class.
    pub assignment: Vec<i64>,
    pub objective: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct SearchOutcome {
    pub status: SolveStatus,
    pub incumbent: Option<Incumbent>,
    pub statistics: SearchStatistics,
}

enum Selection {
    Complete,
    DeadEnd,
    Branch(usize),
}

/// Depth-first branch and bound with forward checking.
///
/// Classes are chosen smallest-domain-first (ties by degree), values ascending,
/// so the first solution is already a good one. Each improving solution
/// tightens the exclusive upper bound applied to every objective class.
///
/// The monitor's clock is not restarted, so several searches can share one
/// budget.
pub(crate) struct BranchAndBound<'p, 'm> {
    problem: &'p Problem,
    state: SearchState,
    monitor: &'m mut TimeLimit,
    stats: SearchStatistics,
    incumbent: Option<Incumbent>,
    upper: i64,
    /// A solution at or below this objective ends the search.
    target: i64,
    aborted: Option<String>,
}

impl<'p, 'm> BranchAndBound<'p, 'm> {
    pub fn new(problem: &'p Problem, monitor: &'m mut TimeLimit) -> Self {
        Self {
            problem,
            state: SearchState::new(&problem.domains, problem.caps.len()),
            monitor,
            stats: SearchStatistics::default(),
            incumbent: None,
            upper: i64::MAX,
            target: problem.lower_bound,
            aborted: None,
        }
    }

    /// Also stops at the first solution whose objective is `<= floor`.
    /// `Optimal` then means optimal for any objective of at least `floor`.
    pub fn with_target(mut self, floor: i64) -> Self {
        self.target = self.target.max(floor);
        self
    }

    pub fn run(mut self) -> SearchOutcome {
        self.stats.root_lower_bound = self.problem.lower_bound;
        let _ = self.dfs(0);
        self.stats.time_total = self.monitor.elapsed();

        let status = match (&self.aborted, &self.incumbent) {
            (Some(reason), Some(_)) => {
                debug!(%reason, "search aborted with an incumbent");
                SolveStatus::Feasible
            }
            (Some(reason), None) => {
                debug!(%reason, "search aborted without a solution");
                SolveStatus::Unknown
            }
            (None, Some(_)) => SolveStatus::Optimal,
            (None, None) => SolveStatus::Infeasible,
        };
        SearchOutcome {
            status,
            incumbent: self.incumbent,
            statistics: self.stats,
        }
    }

    fn dfs(&mut self, depth: u64) -> ControlFlow<()> {
        if let Some(reason) = self.monitor.check_termination() {
            self.aborted = Some(reason);
            return ControlFlow::Break(());
        }
        self.stats.on_node_explored();
        self.stats.on_depth_update(depth);

        let class = match self.select() {
            Selection::Complete => return self.on_complete(),
            Selection::DeadEnd => {
                self.stats.on_pruning_infeasible();
                return ControlFlow::Continue(());
            }
            Selection::Branch(class) => class,
        };

        let bounded = self.problem.bounded[class];
        let candidates: Vec<i64> = self
            .state
            .alive_values(class)
            .filter(|&v| !bounded || v < self.upper)
            .collect();
        for value in candidates {
            // The bound may have tightened under a previous sibling.
            if bounded && value >= self.upper {
                self.stats.on_pruning_bound();
                break;
            }
            let mark = self.state.mark();
            if self.propagate(class, value) {
                self.dfs(depth + 1)?;
            } else {
                self.stats.on_pruning_infeasible();
            }
            self.state.undo_to(mark);
            self.stats.on_backtrack();
        }
        ControlFlow::Continue(())
    }

    fn select(&self) -> Selection {
        let mut best: Option<(usize, usize, usize)> = None;
        for class in 0..self.state.num_classes() {
            if self.state.value_of(class).is_some() {
                continue;
            }
            let size = if self.problem.bounded[class] {
                self.state.count_below(class, self.upper)
            } else {
                self.state.size(class)
            };
            if size == 0 {
                return Selection::DeadEnd;
            }
            let key = (size, usize::MAX - self.problem.degree[class], class);
            if best.is_none_or(|b| key < b) {
                best = Some(key);
            }
        }
        match best {
            Some((_, _, class)) => Selection::Branch(class),
            None => Selection::Complete,
        }
    }

    /// Assigns `value` to `class` and forward-checks its constraints.
    /// Returns `false` on a wipe-out or a broken cap.
    fn propagate(&mut self, class: usize, value: i64) -> bool {
        let problem = self.problem;
        self.state.assign(class, value);

        for &other in &problem.neighbors[class] {
            match self.state.value_of(other) {
                Some(taken) if taken == value => return false,
                Some(_) => {}
                None => {
                    if !self.state.remove_value(other, value) {
                        return false;
                    }
                }
            }
        }

        for &(cap_index, member_index) in &problem.class_caps[class] {
            let cap = &problem.caps[cap_index];
            if !cap.members[member_index].range.contains(&value) {
                continue;
            }
            let count = self.state.bump_cap(cap_index);
            if count > cap.bound {
                return false;
            }
            if count == cap.bound {
                // Saturated: no other open member may land in its range.
                for member in &cap.members {
                    if self.state.value_of(member.class).is_none()
                        && !self.state.remove_range(member.class, &member.range)
                    {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn on_complete(&mut self) -> ControlFlow<()> {
        let Some(assignment) = self.state.assignment() else {
            return ControlFlow::Continue(());
        };
        let objective = self.problem.objective_value(&assignment);
        let value = objective.unwrap_or(0);
        if self
            .incumbent
            .as_ref()
            .is_some_and(|incumbent| incumbent.objective <= value)
        {
            return ControlFlow::Continue(());
        }

        self.stats.on_solution_found();
        trace!(
            objective = value,
            nodes = self.stats.nodes_explored,
            "improving solution"
        );
        self.incumbent = Some(Incumbent {
            assignment,
            objective: value,
        });
        self.upper = value;

        match objective {
            // Pure satisfaction: the first solution settles it.
            None => ControlFlow::Break(()),
            Some(v) if v <= self.target => ControlFlow::Break(()),
            Some(_) => ControlFlow::Continue(()),
        }
    }
}

/// Solves every independent component of `problem` on its own, under one
/// shared budget, and joins the assignments.
///
/// Components run highest lower bound first. Once a component has a
/// solution, its objective is a floor for the max, so later components stop
/// as soon as they reach it.
pub(crate) fn solve_components(problem: &Problem, monitor: &mut TimeLimit) -> SearchOutcome {
    monitor.start();
    let mut parts: Vec<(Vec<usize>, Problem)> = problem
        .components()
        .into_iter()
        .map(|classes| {
            let part = problem.restrict(&classes);
            (classes, part)
        })
        .collect();
    parts.sort_by_key(|(classes, part)| (Reverse(part.lower_bound), Reverse(classes.len())));
    debug!(components = parts.len(), "independent components");

    let mut statistics = SearchStatistics {
        root_lower_bound: problem.lower_bound,
        ..SearchStatistics::default()
    };
    let mut assignment = vec![0; problem.class_count()];
    let mut floor = i64::MIN;
    let mut proven = true;

    for (classes, part) in &parts {
        let outcome = BranchAndBound::new(part, monitor).with_target(floor).run();
        statistics.absorb(&outcome.statistics);
        let status = outcome.status;
        let Some(incumbent) = outcome.incumbent.filter(|_| status.has_solution()) else {
            debug!(%status, classes = classes.len(), "component without a solution");
            statistics.time_total = monitor.elapsed();
            return SearchOutcome {
                status,
                incumbent: None,
                statistics,
            };
        };
        proven &= status == SolveStatus::Optimal;
        if part.objective.is_some() {
            floor = floor.max(incumbent.objective);
        }
        for (local, &class) in classes.iter().enumerate() {
            assignment[class] = incumbent.assignment[local];
        }
    }

    statistics.time_total = monitor.elapsed();
    let objective = problem.objective_value(&assignment).unwrap_or(0);
    SearchOutcome {
        status: if proven {
            SolveStatus::Optimal
        } else {
            SolveStatus::Feasible
        },
        incumbent: Some(Incumbent {
            assignment,
            objective,
        }),
        statistics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn solve(problem: &Problem) -> SearchOutcome {
        let mut monitor = TimeLimit::new(Duration::from_secs(5), 1);
        solve_components(problem, &mut monitor)
    }

    fn all_different(classes: Range<usize>, total: usize) -> Vec<Vec<usize>> {
        (0..total)
            .map(|i| {
                if classes.contains(&i) {
                    classes.clone().filter(|&j| j != i).collect()
                } else {
                    Vec::new()
                }
            })
            .collect()
    }

    #[test]
    fn test_lower_bound_from_domain_minima() {
        let problem = Problem::new(
            vec![vec![2, 5], vec![0, 1], vec![7]],
            vec![Vec::new(); 3],
            Vec::new(),
            Some(vec![0, 1]),
        );
        assert_eq!(problem.lower_bound(), 2);
        assert_eq!(problem.class_count(), 3);
    }

    #[test]
    fn test_lower_bound_from_cliques() {
        // Four mutually different classes need four distinct slots.
        let problem = Problem::new(
            vec![vec![0, 1, 2, 3, 4, 5]; 4],
            all_different(0..4, 4),
            Vec::new(),
            Some((0..4).collect()),
        );
        assert_eq!(problem.lower_bound(), 3);

        // The joint domain decides, not the clique size alone.
        let problem = Problem::new(
            vec![vec![0, 6], vec![0, 6], vec![0, 6, 9]],
            all_different(0..3, 3),
            Vec::new(),
            Some(vec![0, 1, 2]),
        );
        assert_eq!(problem.lower_bound(), 9);
    }

    #[test]
    fn test_stops_at_lower_bound() {
        let problem = Problem::new(
            vec![vec![0, 1, 2], vec![0, 1, 2]],
            vec![vec![1], vec![0]],
            Vec::new(),
            Some(vec![0, 1]),
        );
        let outcome = solve(&problem);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.incumbent.unwrap().objective, 1);
        assert_eq!(outcome.statistics.solutions_found, 1);
    }

    #[test]
    fn test_cap_keeps_search_past_first_solution() {
        // The clique bound says 2, but the cap pushes the optimum to 3.
        let cap = vec![
            CapMember { class: 0, range: 0..2 },
            CapMember { class: 1, range: 0..2 },
            CapMember { class: 2, range: 0..2 },
        ];
        let problem = Problem::new(
            vec![vec![0, 1, 2, 3]; 3],
            all_different(0..3, 3),
            vec![(cap, 1)],
            Some(vec![0, 1, 2]),
        );
        assert_eq!(problem.lower_bound(), 2);
        let outcome = solve(&problem);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        let incumbent = outcome.incumbent.unwrap();
        assert_eq!(incumbent.objective, 3);
        let below_two = incumbent.assignment.iter().filter(|&&v| v < 2).count();
        assert_eq!(below_two, 1);
    }

    #[test]
    fn test_cap_saturation_prunes_ranges() {
        let cap = vec![
            CapMember { class: 0, range: 0..2 },
            CapMember { class: 1, range: 0..2 },
        ];
        let problem = Problem::new(
            vec![vec![0, 1], vec![0, 1]],
            vec![Vec::new(); 2],
            vec![(cap, 1)],
            None,
        );
        let outcome = solve(&problem);
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.statistics.prunings_infeasible > 0);
    }

    #[test]
    fn test_components_split_on_disequalities_and_caps() {
        let cap = vec![
            CapMember { class: 3, range: 0..2 },
            CapMember { class: 5, range: 0..2 },
        ];
        let mut neighbors = all_different(0..3, 6);
        neighbors[3] = Vec::new();
        let problem = Problem::new(
            vec![vec![0, 1, 2, 3]; 6],
            neighbors,
            vec![(cap, 1)],
            Some((0..6).collect()),
        );
        assert_eq!(
            problem.components(),
            vec![vec![0, 1, 2], vec![3, 5], vec![4]]
        );

        let part = problem.restrict(&[3, 5]);
        assert_eq!(part.class_count(), 2);
        assert_eq!(part.caps.len(), 1);
        assert_eq!(part.caps[0].members[1].class, 1);
        assert_eq!(part.objective, Some(vec![0, 1]));
    }

    #[test]
    fn test_independent_components_are_each_optimal() {
        // Triangle {0, 1, 2} and pair {3, 4}: makespan 2, set by the triangle.
        let mut neighbors = all_different(0..3, 5);
        neighbors[3] = vec![4];
        neighbors[4] = vec![3];
        let problem = Problem::new(
            vec![vec![0, 1, 2, 3, 4, 5]; 5],
            neighbors,
            Vec::new(),
            Some((0..5).collect()),
        );
        let outcome = solve(&problem);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        let incumbent = outcome.incumbent.unwrap();
        assert_eq!(incumbent.objective, 2);
        assert_ne!(incumbent.assignment[3], incumbent.assignment[4]);
        assert_eq!(outcome.statistics.root_lower_bound, 2);
    }

    #[test]
    fn test_many_independent_blocks_reach_the_optimum() {
        // Twenty blocks of six mutually different classes, each with its own
        // cap of three below slot 8: every block needs slot 10 at best.
        let blocks = 20;
        let size = 6;
        let total = blocks * size;
        let mut neighbors = vec![Vec::new(); total];
        let mut caps = Vec::new();
        for block in 0..blocks {
            let range = block * size..(block + 1) * size;
            for i in range.clone() {
                neighbors[i] = range.clone().filter(|&j| j != i).collect();
            }
            let members = range
                .map(|class| CapMember { class, range: 0..8 })
                .collect();
            caps.push((members, 3));
        }
        let problem = Problem::new(
            vec![(0..16).collect(); total],
            neighbors,
            caps,
            Some((0..total).collect()),
        );
        assert_eq!(problem.components().len(), blocks);

        let outcome = solve(&problem);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.incumbent.unwrap().objective, 10);
    }

    #[test]
    fn test_infeasible_component_fails_the_whole_problem() {
        let mut neighbors = all_different(0..3, 4);
        neighbors[3] = Vec::new();
        let problem = Problem::new(
            vec![vec![0, 1], vec![0, 1], vec![0, 1], vec![0, 1]],
            neighbors,
            Vec::new(),
            Some((0..4).collect()),
        );
        let outcome = solve(&problem);
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.incumbent.is_none());
    }

    #[test]
    fn test_spent_budget_without_solution_is_unknown() {
        let n = 12;
        let problem = Problem::new(
            vec![(0..n as i64).collect(); n],
            all_different(0..n, n),
            Vec::new(),
            Some((0..n).collect()),
        );
        let mut monitor = TimeLimit::new(Duration::ZERO, 1);
        std::thread::sleep(Duration::from_millis(2));
        let outcome = BranchAndBound::new(&problem, &mut monitor).run();
        assert_eq!(outcome.status, SolveStatus::Unknown);
        assert!(outcome.incumbent.is_none());
        assert_eq!(outcome.statistics.nodes_explored, 0);
    }

    #[test]
    fn test_target_ends_search_early() {
        // Alone, the pair would settle at 1; a floor of 4 accepts the first
        // solution at or below it.
        let problem = Problem::new(
            vec![vec![0, 1, 2], vec![0, 1, 2]],
            vec![vec![1], vec![0]],
            Vec::new(),
            Some(vec![0, 1]),
        );
        let mut monitor = TimeLimit::new(Duration::from_secs(5), 1);
        let outcome = BranchAndBound::new(&problem, &mut monitor)
            .with_target(4)
            .run();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.statistics.solutions_found, 1);
        assert!(outcome.incumbent.unwrap().objective <= 4);
    }
}
