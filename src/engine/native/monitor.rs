use std::time::{Duration, Instant};

/// Terminates the search after a wall-clock budget.
///
/// Checks the clock only every `check_interval` nodes to keep the hot loop cheap;
/// the budget may be overshot by at most that many nodes.
#[derive(Debug, Clone)]
pub(crate) struct TimeLimit {
    time_limit: Duration,
    start_time: Instant,
    check_interval: u64,
    ops_since_last_check: u64,
}

impl TimeLimit {
    pub fn new(time_limit: Duration, check_interval: u64) -> Self {
        Self {
            time_limit,
            start_time: Instant::now(),
            check_interval: check_interval.max(1),
            ops_since_last_check: 0,
        }
    }

    /// Restarts the clock.
    pub fn start(&mut self) {
        self.start_time = Instant::now();
        self.ops_since_last_check = 0;
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the reason to stop, if the budget is spent.
    pub fn check_termination(&mut self) -> Option<String> {
        self.ops_since_last_check = self.ops_since_last_check.saturating_add(1);
        if self.ops_since_last_check < self.check_interval {
            return None;
        }
        self.ops_since_last_check = 0;
        (self.start_time.elapsed() > self.time_limit).then(|| {
            format!(
                "time limit of {:.2?} exceeded",
                self.time_limit
            )
        })
    }
}
