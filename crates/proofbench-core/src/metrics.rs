//! Process-wide counters for benchmark activity.
//!
//! Incremented at the call site; [`Metrics::flush`] emits all values as one
//! `info!` event at the end of a command.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    tasks_executed: AtomicU64,
    tasks_failed: AtomicU64,
    runs_completed: AtomicU64,
    rows_deduplicated: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            tasks_executed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            rows_deduplicated: AtomicU64::new(0),
        }
    }

    pub fn inc_tasks_executed(&self) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tasks_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_deduplicated(&self, n: u64) {
        self.rows_deduplicated.fetch_add(n, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            tasks_executed = self.tasks_executed(),
            tasks_failed = self.tasks_failed(),
            runs_completed = self.runs_completed(),
            rows_deduplicated = self.rows_deduplicated(),
        );
    }

    pub fn tasks_executed(&self) -> u64 {
        self.tasks_executed.load(Ordering::Relaxed)
    }

    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub fn rows_deduplicated(&self) -> u64 {
        self.rows_deduplicated.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.inc_tasks_executed();
        m.inc_tasks_executed();
        m.inc_tasks_failed();
        m.inc_runs_completed();
        m.add_rows_deduplicated(3);
        assert_eq!(m.tasks_executed(), 2);
        assert_eq!(m.tasks_failed(), 1);
        assert_eq!(m.runs_completed(), 1);
        assert_eq!(m.rows_deduplicated(), 3);
    }
}
