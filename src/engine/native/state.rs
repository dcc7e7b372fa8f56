use std::ops::Range;

/// One undoable mutation of the search state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TrailEntry {
    /// `class` got a value.
    Assigned { class: usize },
    /// The value at `position` of `class`'s domain was pruned.
    Removed { class: usize, position: usize },
    /// The true-literal count of `cap` was incremented.
    CapCount { cap: usize },
}

/// Mutable state of the depth-first search.
///
/// Every change goes through the trail so that [`SearchState::undo_to`] can
/// restore any earlier decision level exactly.
#[derive(Debug, Clone)]
pub(crate) struct SearchState {
    values: Vec<Vec<i64>>,
    alive: Vec<Vec<bool>>,
    sizes: Vec<usize>,
    assigned: Vec<Option<i64>>,
    cap_counts: Vec<i64>,
    trail: Vec<TrailEntry>,
}

impl SearchState {
    /// `domains` must be sorted ascending without duplicates.
    pub fn new(domains: &[Vec<i64>], num_caps: usize) -> Self {
        Self {
            values: domains.to_vec(),
            alive: domains.iter().map(|d| vec![true; d.len()]).collect(),
            sizes: domains.iter().map(Vec::len).collect(),
            assigned: vec![None; domains.len()],
            cap_counts: vec![0; num_caps],
            trail: Vec::new(),
        }
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn size(&self, class: usize) -> usize {
        self.sizes[class]
    }

    #[inline]
    pub fn value_of(&self, class: usize) -> Option<i64> {
        self.assigned[class]
    }

    #[cfg(test)]
    pub fn cap_count(&self, cap: usize) -> i64 {
        self.cap_counts[cap]
    }

    /// Alive values of `class`, ascending.
    pub fn alive_values(&self, class: usize) -> impl Iterator<Item = i64> + '_ {
        self.values[class]
            .iter()
            .zip(&self.alive[class])
            .filter_map(|(&value, &alive)| alive.then_some(value))
    }

    /// Number of alive values strictly below `bound`.
    pub fn count_below(&self, class: usize, bound: i64) -> usize {
        let end = self.values[class].partition_point(|&v| v < bound);
        self.alive[class][..end].iter().filter(|&&a| a).count()
    }

    pub fn assignment(&self) -> Option<Vec<i64>> {
        self.assigned.iter().copied().collect()
    }

    #[inline]
    pub fn mark(&self) -> usize {
        self.trail.len()
    }

    pub fn assign(&mut self, class: usize, value: i64) {
        self.assigned[class] = Some(value);
        self.trail.push(TrailEntry::Assigned { class });
    }

    /// Prunes `value` from `class`. Returns `false` if the domain became empty.
    pub fn remove_value(&mut self, class: usize, value: i64) -> bool {
        if let Ok(position) = self.values[class].binary_search(&value) {
            self.kill(class, position);
        }
        self.sizes[class] > 0
    }

    /// Prunes every value of `class` inside `range`. Returns `false` if the
    /// domain became empty.
    pub fn remove_range(&mut self, class: usize, range: &Range<i64>) -> bool {
        let start = self.values[class].partition_point(|&v| v < range.start);
        let end = self.values[class].partition_point(|&v| v < range.end);
        for position in start..end {
            self.kill(class, position);
        }
        self.sizes[class] > 0
    }

    /// Increments the true-literal count of `cap` and returns the new count.
    pub fn bump_cap(&mut self, cap: usize) -> i64 {
        self.cap_counts[cap] += 1;
        self.trail.push(TrailEntry::CapCount { cap });
        self.cap_counts[cap]
    }

    fn kill(&mut self, class: usize, position: usize) {
        if self.alive[class][position] {
            self.alive[class][position] = false;
            self.sizes[class] -= 1;
            self.trail.push(TrailEntry::Removed { class, position });
        }
    }

    /// Reverts every change made after `mark`.
    pub fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some(entry) = self.trail.pop() else { break };
            match entry {
                TrailEntry::Assigned { class } => self.assigned[class] = None,
                TrailEntry::Removed { class, position } => {
                    self.alive[class][position] = true;
                    self.sizes[class] += 1;
                }
                TrailEntry::CapCount { cap } => self.cap_counts[cap] -= 1,
            }
        }
    }
}
