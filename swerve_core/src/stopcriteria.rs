use crate::history::Outcome;
use std::time::{Duration, Instant};

/// Budget control for one search run. The driver consults
/// `is_random_phase` / `is_over` before each iteration and reports every
/// executed test through `execute_test`.
pub trait StopCriterion {
    /// Whether the initial random-generation phase is still running.
    fn is_random_phase(&self) -> bool;

    /// Whether the whole search budget is used up.
    fn is_over(&self) -> bool;

    /// Informs the criterion that a test has been executed with the given
    /// outcome (`None` if it never ran).
    fn execute_test(&mut self, outcome: Option<Outcome>);
}

/// Counts executions against a fixed budget: `n_random` of them belong to
/// the random phase, `n_total` ends the run. Roads rejected as INVALID
/// don't consume budget unless `counting_invalid` is set.
#[derive(Debug, Clone)]
pub struct CountingStop {
    n_total: u64,
    n_random: u64,
    count_invalid: bool,
    exec_count: u64,
}

impl CountingStop {
    pub fn new(n_total: u64, n_random: u64) -> Self {
        Self {
            n_total,
            n_random,
            count_invalid: false,
            exec_count: 0,
        }
    }

    pub fn counting_invalid(mut self) -> Self {
        self.count_invalid = true;
        self
    }

    pub fn exec_count(&self) -> u64 {
        self.exec_count
    }
}

impl StopCriterion for CountingStop {
    fn is_random_phase(&self) -> bool {
        self.exec_count < self.n_random
    }

    fn is_over(&self) -> bool {
        self.exec_count >= self.n_total
    }

    fn execute_test(&mut self, outcome: Option<Outcome>) {
        if self.count_invalid || outcome != Some(Outcome::Invalid) {
            self.exec_count += 1;
        }
    }
}

/// Wall-clock budget: `random_time` of random generation inside a
/// `total_time` overall budget, measured from construction (or `reset`).
#[derive(Debug, Clone)]
pub struct TimeStop {
    random_time: Duration,
    total_time: Duration,
    start_time: Instant,
}

impl TimeStop {
    pub fn new(random_time: Duration, total_time: Duration) -> Self {
        Self {
            random_time,
            total_time,
            start_time: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.start_time = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.total_time.saturating_sub(self.elapsed())
    }
}

impl StopCriterion for TimeStop {
    fn is_random_phase(&self) -> bool {
        self.elapsed() <= self.random_time
    }

    fn is_over(&self) -> bool {
        self.remaining().is_zero()
    }

    fn execute_test(&mut self, _outcome: Option<Outcome>) {}
}
