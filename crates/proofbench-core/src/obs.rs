//! Structured lifecycle events for benchmark runs.
//!
//! Every event carries an `event` field (`run.started`, `task.graded`, ...)
//! so log pipelines can filter on it. [`RunSpan`] tags all events emitted
//! while a run is active with its `run_id`.

use tracing::{info, warn};

/// Run-scoped span; attach with `tracing::Instrument`.
pub struct RunSpan;

impl RunSpan {
    pub fn span(run_id: &str) -> tracing::Span {
        tracing::info_span!("proofbench.run", run_id = %run_id)
    }
}

pub fn emit_run_started(run_id: &str, profile: &str, mode: &str, tasks: usize) {
    info!(event = "run.started", run_id = %run_id, profile = %profile, mode = %mode, tasks = tasks);
}

pub fn emit_task_graded(task_id: &str, score: f64, ok: bool, latency_ms: f64, note: &str) {
    info!(
        event = "task.graded",
        task_id = %task_id,
        score = score,
        ok = ok,
        latency_ms = latency_ms,
        note = %note,
    );
}

/// Per-task transport failure (warning level); the run continues.
pub fn emit_task_failed(task_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "task.failed", task_id = %task_id, error = %error);
}

pub fn emit_phase_aggregated(run_id: &str, phase: &str, samples: usize, pass_rate: f64, score: f64) {
    info!(
        event = "phase.aggregated",
        run_id = %run_id,
        phase = %phase,
        samples = samples,
        pass_rate = pass_rate,
        score = score,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, phases: usize, traces: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        phases = phases,
        traces = traces,
    );
}

pub fn emit_manifest_written(run_id: &str, path: &std::path::Path) {
    info!(event = "manifest.written", run_id = %run_id, path = %path.display());
}

pub fn emit_merge_completed(inputs: usize, merged: usize, dropped: usize) {
    info!(event = "merge.completed", inputs = inputs, merged = merged, dropped = dropped);
}

pub fn emit_pack_built(path: &std::path::Path, entries: usize) {
    info!(event = "pack.built", path = %path.display(), entries = entries);
}
