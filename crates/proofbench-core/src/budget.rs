//! Budget accounting over the planned task count.
//!
//! This is evaluated before execution and recorded in the manifest. It does
//! not interrupt an in-flight suite.

use serde::{Deserialize, Serialize};

/// Inputs to budget accounting. Any of them may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetPlan {
    pub target_tasks: Option<u64>,
    pub cost_per_task_usd: Option<f64>,
    pub budget_usd: Option<f64>,
}

/// Budget figures recorded in the run manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetAccounting {
    pub target_tasks: u64,
    pub processed_tasks: u64,
    pub cost_per_task_usd: Option<f64>,
    pub budget_usd: Option<f64>,
    pub total_cost_usd: Option<f64>,
    /// Set when the budget ceiling truncates the target.
    pub stop_reason: Option<String>,
}

fn round_usd(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

impl BudgetPlan {
    /// Compute `processed = min(target, floor(budget / cost))`.
    ///
    /// `fallback_target` (usually the suite length) is used when the plan
    /// names no target. Without a positive cost and a budget there is no cap.
    pub fn account(&self, fallback_target: u64) -> BudgetAccounting {
        let target = self.target_tasks.unwrap_or(fallback_target);
        let cost = self.cost_per_task_usd.filter(|c| c.is_finite() && *c > 0.0);

        let affordable = match (cost, self.budget_usd) {
            (Some(cost), Some(budget)) if budget.is_finite() => {
                Some((budget.max(0.0) / cost).floor() as u64)
            }
            _ => None,
        };

        let (processed, stop_reason) = match affordable {
            Some(max) if max < target => (
                max,
                Some(format!(
                    "budget_cap: budget_usd={:.2} covers {} of {} tasks",
                    self.budget_usd.unwrap_or_default(),
                    max,
                    target
                )),
            ),
            _ => (target, None),
        };

        BudgetAccounting {
            target_tasks: target,
            processed_tasks: processed,
            cost_per_task_usd: self.cost_per_task_usd,
            budget_usd: self.budget_usd,
            total_cost_usd: cost.map(|c| round_usd(c * processed as f64)),
            stop_reason,
        }
    }
}
