//! Human-facing reports: `reports/summary.json` collected from every
//! `results/*.txt` summary, and the newest run manifest rendered as
//! Markdown at `reports/latest.md`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::WorkspaceLayout;
use crate::domain::error::Result;
use crate::manifest::RunManifest;
use crate::proof_pack::newest;
use crate::result_file::{write_json, write_text};

/// `reports/summary.json`: every `results/*.txt` keyed by file stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsReport {
    pub generated: DateTime<Utc>,
    pub results: BTreeMap<String, String>,
}

/// Collect the text summaries in `results_dir`. Unreadable files are skipped.
pub fn collect_text_summaries(results_dir: &Path) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let Ok(entries) = std::fs::read_dir(results_dir) else {
        return out;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                out.insert(stem, text);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable summary"),
        }
    }
    out
}

/// Write `reports/summary.json`.
pub fn write_results_report(layout: &WorkspaceLayout, generated: DateTime<Utc>) -> Result<PathBuf> {
    let report = ResultsReport {
        generated,
        results: collect_text_summaries(&layout.results),
    };
    let path = layout.reports.join("summary.json");
    write_json(&path, &report)?;
    Ok(path)
}

fn opt_ms(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.1} ms")).unwrap_or_else(|| "n/a".to_string())
}

/// Render a run manifest as Markdown.
pub fn render_manifest_md(manifest: &RunManifest) -> String {
    let repro = &manifest.reproducibility;
    let metrics = &manifest.metrics;
    let mut out = String::new();

    out.push_str(&format!("# Run {}\n\n", manifest.run_id));
    out.push_str(&format!(
        "- profile: {}\n- timestamp: {}\n- mode: {}\n- duration: {} ms\n\n",
        manifest.profile,
        manifest.timestamp.to_rfc3339(),
        manifest.mode,
        manifest.duration_ms
    ));

    out.push_str("## Reproducibility\n");
    out.push_str(&format!(
        "- git revision: {}\n- config fingerprint: {}\n- suite sha256: {}\n- endpoint: {}\n- model: {}\n- seed: {}\n\n",
        repro.git_revision.or_display("n/a"),
        repro.config_fingerprint.or_display("n/a"),
        repro.suite_sha256.or_display("n/a"),
        repro.endpoint.or_display("n/a"),
        repro.model.or_display("n/a"),
        repro
            .seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
    ));

    out.push_str("## Metrics\n");
    out.push_str(&format!(
        "- tasks: {} ({} failed)\n- success rate: {}\n- latency p50/p90/p95/p99: {} / {} / {} / {}\n\n",
        metrics.task_count,
        metrics.tasks_failed,
        metrics
            .success_rate
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "n/a".to_string()),
        opt_ms(metrics.p50_ms),
        opt_ms(metrics.p90_ms),
        opt_ms(metrics.p95_ms),
        opt_ms(metrics.p99_ms),
    ));

    out.push_str("## Budget\n");
    out.push_str(&format!(
        "- target tasks: {}\n- processed tasks: {}\n",
        manifest.budget.target_tasks, manifest.budget.processed_tasks
    ));
    if let Some(total) = manifest.budget.total_cost_usd {
        out.push_str(&format!("- total cost: ${total:.2}\n"));
    }
    if let Some(reason) = &manifest.budget.stop_reason {
        out.push_str(&format!("- stop reason: {reason}\n"));
    }
    out.push('\n');

    if !manifest.phases.is_empty() {
        out.push_str("## Phases\n\n| phase | status | score | retries | trace |\n|---|---|---|---|---|\n");
        for phase in &manifest.phases {
            out.push_str(&format!(
                "| {} | {} | {:.2} | {} | {} |\n",
                phase.phase, phase.status, phase.score, phase.retries, phase.trace
            ));
        }
    }
    out
}

/// Render the newest manifest to `reports/latest.md`. `None` when there is
/// no readable manifest.
pub fn write_latest_manifest_md(layout: &WorkspaceLayout) -> Result<Option<PathBuf>> {
    let Some(source) = newest(&layout.manifests, |n| n.ends_with(".json")) else {
        return Ok(None);
    };
    let manifest = match RunManifest::load(&source) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %source.display(), error = %e, "latest manifest unreadable");
            return Ok(None);
        }
    };
    let path = layout.reports.join("latest.md");
    write_text(&path, &render_manifest_md(&manifest))?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactIndex;
    use crate::budget::BudgetAccounting;
    use crate::domain::task::Phase;
    use crate::domain::trace::{PhaseEntry, PhaseStatus};
    use crate::manifest::{ManifestMetrics, Reproducibility, MANIFEST_SCHEMA};
    use crate::metadata::MetadataValue;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .expect("parse RFC3339")
            .with_timezone(&Utc)
    }

    fn manifest() -> RunManifest {
        RunManifest {
            schema: MANIFEST_SCHEMA.into(),
            run_id: "p-20260101T000000Z".into(),
            profile: "p".into(),
            timestamp: ts(),
            mode: "real".into(),
            duration_ms: 1200,
            reproducibility: Reproducibility {
                git_revision: MetadataValue::Present("deadbeef".into()),
                ..Reproducibility::default()
            },
            budget: BudgetAccounting {
                target_tasks: 4,
                processed_tasks: 4,
                ..BudgetAccounting::default()
            },
            metrics: ManifestMetrics {
                task_count: 4,
                success_rate: Some(0.5),
                p50_ms: Some(12.0),
                ..ManifestMetrics::default()
            },
            phases: vec![PhaseEntry {
                run_id: "p-20260101T000000Z-strength".into(),
                profile: "p".into(),
                phase: Phase::Strength,
                timestamp: ts(),
                status: PhaseStatus::Fail,
                score: 55.0,
                retries: 2,
                trace: "samples=4 avg latency=12.0ms".into(),
                ..PhaseEntry::default()
            }],
            artifacts: ArtifactIndex::default(),
        }
    }

    #[test]
    fn manifest_markdown_mentions_key_facts() {
        let md = render_manifest_md(&manifest());
        assert!(md.starts_with("# Run p-20260101T000000Z\n"));
        assert!(md.contains("- git revision: deadbeef\n"));
        assert!(md.contains("- model: n/a\n"));
        assert!(md.contains("- success rate: 50.0%\n"));
        assert!(md.contains("12.0 ms / n/a / n/a / n/a"));
        assert!(md.contains("| Strength | fail | 55.00 | 2 | samples=4 avg latency=12.0ms |"));
    }

    #[test]
    fn summary_collects_txt_files_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = WorkspaceLayout::new(dir.path());
        std::fs::create_dir_all(&layout.results).expect("mkdir");
        std::fs::write(layout.results.join("nightly.txt"), "ok\n").expect("write");
        std::fs::write(layout.results.join("nightly-1.json"), "[]").expect("write");

        let path = write_results_report(&layout, ts()).expect("report");
        let raw = std::fs::read_to_string(path).expect("read");
        let report: ResultsReport = serde_json::from_str(&raw).expect("parse");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results["nightly"], "ok\n");
    }

    #[test]
    fn no_manifest_means_no_markdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = WorkspaceLayout::new(dir.path());
        assert_eq!(write_latest_manifest_md(&layout).expect("render"), None);
    }
}
