//! Task runner: drives a suite through the chat client, grades each
//! response and aggregates the traces per phase.
//!
//! Tasks run one at a time in suite order. A failed or timed-out call
//! becomes a failed [`TaskTrace`]; nothing a single task does can abort the
//! run.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use proofbench_llm::{ChatClient, ChatRequest};

use crate::budget::{BudgetAccounting, BudgetPlan};
use crate::domain::task::{Phase, Suite, Task};
use crate::domain::trace::{
    retries_for_score, round2, run_key, PhaseEntry, PhaseStatus, TaskTrace,
};
use crate::grader::grade;
use crate::metrics::METRICS;
use crate::obs;
use crate::synthetic::{rng_for, synthetic_phase_entries};

/// Default per-task timeout.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 60;

/// How tasks are executed.
#[derive(Clone)]
pub enum ExecutionMode {
    /// Send every task to the completion service.
    Real(Arc<dyn ChatClient>),
    /// Draw phase scores from fixed distributions; no task is sent anywhere.
    Synthetic { seed: Option<u64> },
}

impl ExecutionMode {
    /// Real mode when a client is available and there is something to run,
    /// synthetic otherwise.
    pub fn select(client: Option<Arc<dyn ChatClient>>, suite: &Suite, seed: Option<u64>) -> Self {
        match client {
            Some(client) if !suite.is_empty() => ExecutionMode::Real(client),
            _ => ExecutionMode::Synthetic { seed },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutionMode::Real(_) => "real",
            ExecutionMode::Synthetic { .. } => "synthetic",
        }
    }
}

impl std::fmt::Debug for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Real(client) => f
                .debug_struct("Real")
                .field("endpoint", &client.endpoint())
                .field("model", &client.model())
                .finish(),
            ExecutionMode::Synthetic { seed } => {
                f.debug_struct("Synthetic").field("seed", seed).finish()
            }
        }
    }
}

/// Per-run execution parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub task_timeout: Duration,
    pub budget: BudgetPlan,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tokens: 256,
            temperature: 0.2,
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
            budget: BudgetPlan::default(),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub run_key: String,
    pub profile: String,
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub phase_entries: Vec<PhaseEntry>,
    pub task_traces: Vec<TaskTrace>,
    pub budget: BudgetAccounting,
    pub duration_ms: u64,
}

/// Per-phase statistics over the traces of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseAggregate {
    pub phase: Phase,
    pub count: usize,
    /// Fraction of traces with `ok = true`.
    pub pass_rate: f64,
    pub avg_score: f64,
    /// Mean over traces that have a latency. `None` if none do.
    pub mean_latency_ms: Option<f64>,
}

impl PhaseAggregate {
    /// Aggregate the traces that belong to `phase`. `None` if there are none.
    pub fn from_traces<'a>(
        phase: Phase,
        traces: impl IntoIterator<Item = &'a TaskTrace>,
    ) -> Option<Self> {
        let mut count = 0usize;
        let mut passed = 0usize;
        let mut score_sum = 0.0;
        let mut latencies = Vec::new();

        for trace in traces.into_iter().filter(|t| t.phase == phase) {
            count += 1;
            if trace.ok {
                passed += 1;
            }
            score_sum += trace.score;
            if let Some(latency) = trace.latency_ms {
                latencies.push(latency);
            }
        }

        if count == 0 {
            return None;
        }
        let mean_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };
        Some(Self {
            phase,
            count,
            pass_rate: passed as f64 / count as f64,
            avg_score: score_sum / count as f64,
            mean_latency_ms,
        })
    }

    pub fn status(&self) -> PhaseStatus {
        PhaseStatus::from_pass_rate(self.pass_rate)
    }

    /// Free-text summary stored in [`PhaseEntry::trace`].
    pub fn summary(&self) -> String {
        match self.mean_latency_ms {
            Some(ms) => format!("samples={} avg latency={:.1}ms", self.count, ms),
            None => format!("samples={} avg latency=n/a", self.count),
        }
    }

    pub fn into_entry(self, profile: &str, timestamp: DateTime<Utc>) -> PhaseEntry {
        let score = round2(self.avg_score);
        PhaseEntry {
            run_id: PhaseEntry::make_run_id(profile, &timestamp, self.phase),
            profile: profile.to_string(),
            phase: self.phase,
            timestamp,
            status: self.status(),
            score,
            retries: retries_for_score(score),
            trace: self.summary(),
            ..PhaseEntry::default()
        }
    }
}

/// One phase entry per phase that has traces, in canonical phase order.
pub fn aggregate_phases(
    profile: &str,
    timestamp: DateTime<Utc>,
    traces: &[TaskTrace],
) -> Vec<PhaseEntry> {
    Phase::ALL
        .iter()
        .filter_map(|&phase| PhaseAggregate::from_traces(phase, traces))
        .map(|agg| {
            obs::emit_phase_aggregated(
                &run_key(profile, &timestamp),
                agg.phase.as_str(),
                agg.count,
                agg.pass_rate,
                round2(agg.avg_score),
            );
            agg.into_entry(profile, timestamp)
        })
        .collect()
}

/// Executes a suite for one profile.
pub struct TaskRunner {
    profile: String,
    timestamp: DateTime<Utc>,
    mode: ExecutionMode,
    settings: RunSettings,
}

impl TaskRunner {
    pub fn new(profile: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            profile: profile.into(),
            timestamp: Utc::now().trunc_subsecs(0),
            mode,
            settings: RunSettings::default(),
        }
    }

    /// Pin the run timestamp (second precision, like the artifact stamp).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    pub fn run_key(&self) -> String {
        run_key(&self.profile, &self.timestamp)
    }

    /// Run the suite and aggregate the results.
    pub async fn run(&self, suite: &Suite) -> RunOutput {
        let key = self.run_key();
        self.run_inner(suite, &key)
            .instrument(obs::RunSpan::span(&key))
            .await
    }

    async fn run_inner(&self, suite: &Suite, key: &str) -> RunOutput {
        let started = Instant::now();
        let budget = self.settings.budget.account(suite.len() as u64);
        obs::emit_run_started(key, &self.profile, self.mode.label(), suite.len());
        if let Some(reason) = &budget.stop_reason {
            tracing::info!(run_id = %key, reason = %reason, "budget accounting truncates target");
        }

        let (phase_entries, task_traces) = match &self.mode {
            ExecutionMode::Real(client) => {
                let mut traces = Vec::with_capacity(suite.len());
                for task in &suite.tasks {
                    traces.push(self.execute_task(client.as_ref(), task, key).await);
                }
                let entries = aggregate_phases(&self.profile, self.timestamp, &traces);
                (entries, traces)
            }
            ExecutionMode::Synthetic { seed } => {
                let mut rng = rng_for(*seed);
                let entries = synthetic_phase_entries(&mut rng, &self.profile, self.timestamp);
                (entries, Vec::new())
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        METRICS.inc_runs_completed();
        obs::emit_run_finished(key, duration_ms, phase_entries.len(), task_traces.len());

        RunOutput {
            run_key: key.to_string(),
            profile: self.profile.clone(),
            timestamp: self.timestamp,
            mode: self.mode.label().to_string(),
            phase_entries,
            task_traces,
            budget,
            duration_ms,
        }
    }

    async fn execute_task(&self, client: &dyn ChatClient, task: &Task, key: &str) -> TaskTrace {
        METRICS.inc_tasks_executed();
        let request = ChatRequest::new(task.prompt.clone())
            .with_system(self.settings.system_prompt.clone())
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.settings.task_timeout, client.chat(&request)).await;
        let latency_ms = round2(start.elapsed().as_secs_f64() * 1000.0);

        let error = match outcome {
            Ok(Ok(response)) => {
                let graded = grade(
                    &task.prompt,
                    &task.expected_answer,
                    &response.text,
                    &task.scoring_kind,
                );
                let trace = TaskTrace::graded(key, task, response.text, graded, latency_ms);
                obs::emit_task_graded(&trace.id, trace.score, trace.ok, latency_ms, &trace.note);
                return trace;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "task {} timed out after {}s",
                task.id,
                self.settings.task_timeout.as_secs()
            ),
        };

        METRICS.inc_tasks_failed();
        obs::emit_task_failed(&task.id, &error);
        TaskTrace::failed(key, task, error)
    }
}
