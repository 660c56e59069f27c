//! Interpolated percentiles and the fixed-column latency summary.
//!
//! Percentiles use linear interpolation between the two order statistics
//! bracketing rank `k = (n - 1) * p / 100`, not nearest-rank.

use serde::{Deserialize, Serialize};

/// Percentile of an ascending-sorted slice. `None` when empty.
///
/// `p <= 0` yields the minimum and `p >= 100` the maximum.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let (first, last) = (sorted.first()?, sorted.last()?);
    if p <= 0.0 {
        return Some(*first);
    }
    if p >= 100.0 {
        return Some(*last);
    }

    let k = (sorted.len() - 1) as f64 * (p / 100.0);
    let f = k.floor();
    let c = k.ceil();
    if f == c {
        return Some(sorted[k as usize]);
    }
    let lower = sorted[f as usize] * (c - k);
    let upper = sorted[c as usize] * (k - f);
    Some(lower + upper)
}

/// Sort samples ascending, dropping NaN.
pub fn sorted_samples(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// p50/p90/p95/p99 latency plus success rate.
///
/// Each field is `None` when there was nothing to compute it from; callers
/// render that as an empty cell rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub p50_ms: Option<f64>,
    pub p90_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub success_rate: Option<f64>,
    /// Number of latency samples.
    pub samples: usize,
    /// Number of records with a success verdict.
    pub counted: usize,
}

impl LatencySummary {
    /// Summarize latency samples (any order) and success verdicts.
    pub fn compute(latencies: impl IntoIterator<Item = f64>, outcomes: &[bool]) -> Self {
        let lats = sorted_samples(latencies);
        let success_rate = if outcomes.is_empty() {
            None
        } else {
            let passed = outcomes.iter().filter(|ok| **ok).count();
            Some(passed as f64 / outcomes.len() as f64)
        };
        Self {
            p50_ms: percentile(&lats, 50.0),
            p90_ms: percentile(&lats, 90.0),
            p95_ms: percentile(&lats, 95.0),
            p99_ms: percentile(&lats, 99.0),
            success_rate,
            samples: lats.len(),
            counted: outcomes.len(),
        }
    }

    /// Column names of the summary CSV.
    pub const CSV_HEADER: &'static str = "p50_ms,p90_ms,p95_ms,p99_ms,success_rate";

    /// One CSV data row; missing values are empty cells.
    pub fn csv_row(&self) -> String {
        let ms = |v: Option<f64>| v.map(|x| format!("{x:.1}")).unwrap_or_default();
        let rate = self
            .success_rate
            .map(|x| format!("{x:.4}"))
            .unwrap_or_default();
        format!(
            "{},{},{},{},{}",
            ms(self.p50_ms),
            ms(self.p90_ms),
            ms(self.p95_ms),
            ms(self.p99_ms),
            rate
        )
    }
}
