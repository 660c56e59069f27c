//! Per-run artifact files.
//!
//! Every file name is qualified by profile and run stamp so concurrent runs
//! never write to the same path. The one exception is `results/<profile>.txt`,
//! the latest human summary for a profile.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::WorkspaceLayout;
use crate::domain::error::Result;
use crate::domain::trace::{run_stamp, ResultRecord};
use crate::result_file::{write_json, write_jsonl, write_text};
use crate::runner::RunOutput;

/// Where one run's artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    /// `results/<profile>-<stamp>.json`: phase entries.
    pub results: PathBuf,
    /// `results/tasks-<profile>-<stamp>.json`: task traces, real mode only.
    pub tasks: PathBuf,
    /// `results/<profile>.txt`.
    pub summary: PathBuf,
    /// `logs/<profile>-<stamp>.jsonl`.
    pub log: PathBuf,
    /// `manifests/<profile>.json`.
    pub manifest: PathBuf,
    /// `manifests/<profile>-<stamp>.json`.
    pub run_manifest: PathBuf,
}

/// Root-relative artifact paths as recorded in a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub results: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<String>,
    pub summary: String,
    pub log: String,
    pub manifest: String,
    pub run_manifest: String,
}

impl RunArtifacts {
    pub fn plan(layout: &WorkspaceLayout, output: &RunOutput) -> Self {
        let profile = &output.profile;
        let stamp = run_stamp(&output.timestamp);
        Self {
            results: layout.results.join(format!("{profile}-{stamp}.json")),
            tasks: layout.results.join(format!("tasks-{profile}-{stamp}.json")),
            summary: layout.results.join(format!("{profile}.txt")),
            log: layout.logs.join(format!("{profile}-{stamp}.jsonl")),
            manifest: layout.manifests.join(format!("{profile}.json")),
            run_manifest: layout.manifests.join(format!("{profile}-{stamp}.json")),
        }
    }

    pub fn index(&self, layout: &WorkspaceLayout, has_tasks: bool) -> ArtifactIndex {
        ArtifactIndex {
            results: layout.relative(&self.results),
            tasks: has_tasks.then(|| layout.relative(&self.tasks)),
            summary: layout.relative(&self.summary),
            log: layout.relative(&self.log),
            manifest: layout.relative(&self.manifest),
            run_manifest: layout.relative(&self.run_manifest),
        }
    }

    /// Write results, traces, the text summary and the run log.
    pub fn write_outputs(&self, output: &RunOutput) -> Result<()> {
        write_json(&self.results, &output.phase_entries)?;
        if !output.task_traces.is_empty() {
            write_json(&self.tasks, &output.task_traces)?;
        }
        write_text(&self.summary, &render_text_summary(output))?;

        let log_rows: Vec<ResultRecord> = output
            .task_traces
            .iter()
            .cloned()
            .map(ResultRecord::from)
            .chain(output.phase_entries.iter().cloned().map(ResultRecord::from))
            .collect();
        write_jsonl(&self.log, &log_rows)
    }
}

/// Short human summary of a run, one line per phase.
pub fn render_text_summary(output: &RunOutput) -> String {
    let mut out = format!(
        "profile={} run_id={} mode={} tasks={}\n",
        output.profile,
        output.run_key,
        output.mode,
        output.task_traces.len()
    );
    for entry in &output.phase_entries {
        out.push_str(&format!(
            "{}: {} score={:.2} retries={} {}\n",
            entry.phase, entry.status, entry.score, entry.retries, entry.trace
        ));
    }
    if let Some(reason) = &output.budget.stop_reason {
        out.push_str(&format!("{reason}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetAccounting;
    use crate::domain::task::Phase;
    use crate::domain::trace::{PhaseEntry, PhaseStatus};
    use chrono::{DateTime, Utc};

    fn output() -> RunOutput {
        let ts = DateTime::parse_from_rfc3339("2026-05-04T03:02:01Z")
            .expect("parse RFC3339")
            .with_timezone(&Utc);
        RunOutput {
            run_key: "p-20260504T030201Z".into(),
            profile: "p".into(),
            timestamp: ts,
            mode: "synthetic".into(),
            phase_entries: vec![PhaseEntry {
                run_id: "p-20260504T030201Z-warm-up".into(),
                profile: "p".into(),
                phase: Phase::WarmUp,
                timestamp: ts,
                status: PhaseStatus::Pass,
                score: 84.5,
                retries: 0,
                trace: "synthetic: samples=1 mean=85.0 stdev=5.0".into(),
                ..PhaseEntry::default()
            }],
            task_traces: vec![],
            budget: BudgetAccounting::default(),
            duration_ms: 3,
        }
    }

    #[test]
    fn paths_are_qualified_by_stamp() {
        let layout = WorkspaceLayout::new("/w");
        let plan = RunArtifacts::plan(&layout, &output());
        let index = plan.index(&layout, false);
        assert_eq!(index.results, "results/p-20260504T030201Z.json");
        assert_eq!(index.log, "logs/p-20260504T030201Z.jsonl");
        assert_eq!(index.run_manifest, "manifests/p-20260504T030201Z.json");
        assert_eq!(index.manifest, "manifests/p.json");
        assert_eq!(index.tasks, None);
    }

    #[test]
    fn synthetic_run_writes_no_task_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = WorkspaceLayout::new(dir.path());
        let out = output();
        let plan = RunArtifacts::plan(&layout, &out);
        plan.write_outputs(&out).expect("write");

        assert!(plan.results.exists());
        assert!(!plan.tasks.exists());
        let text = std::fs::read_to_string(&plan.summary).expect("summary");
        assert!(text.contains("Warm-up: pass score=84.50 retries=0"));
        let log = std::fs::read_to_string(&plan.log).expect("log");
        assert_eq!(log.lines().count(), 1);
    }
}
