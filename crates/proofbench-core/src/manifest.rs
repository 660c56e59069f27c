//! Run manifest: the authoritative record of one invocation.
//!
//! Written twice with identical content: `manifests/<profile>.json` (latest
//! for the profile) and `manifests/<profile>-<stamp>.json` (archival, never
//! overwritten by a later run).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::artifacts::{ArtifactIndex, RunArtifacts};
use crate::budget::BudgetAccounting;
use crate::config::{LoadedConfig, WorkspaceLayout};
use crate::domain::error::{BenchError, Result};
use crate::domain::trace::{PhaseEntry, PhaseStatus, TaskTrace};
use crate::metadata::{MetadataProvider, MetadataValue};
use crate::obs;
use crate::percentile::LatencySummary;
use crate::result_file::write_json;
use crate::runner::RunOutput;

/// Manifest schema identifier.
pub const MANIFEST_SCHEMA: &str = "proofbench.manifest.v1";

/// Environment and configuration needed to reproduce a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reproducibility {
    pub git_revision: MetadataValue,
    pub config_path: Option<String>,
    pub config_fingerprint: MetadataValue,
    pub suite_path: Option<String>,
    pub suite_sha256: MetadataValue,
    pub endpoint: MetadataValue,
    pub model: MetadataValue,
    pub seed: Option<u64>,
}

/// Aggregate metrics over the run's task traces and phase entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetrics {
    pub task_count: usize,
    pub tasks_failed: usize,
    pub success_rate: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p90_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub mean_latency_ms: Option<f64>,
    pub phase_count: usize,
    pub phases_passed: usize,
    pub mean_phase_score: Option<f64>,
}

impl ManifestMetrics {
    pub fn compute(traces: &[TaskTrace], phases: &[PhaseEntry]) -> Self {
        let latencies: Vec<f64> = traces.iter().filter_map(|t| t.latency_ms).collect();
        let outcomes: Vec<bool> = traces.iter().map(|t| t.ok).collect();
        let summary = LatencySummary::compute(latencies.iter().copied(), &outcomes);

        let mean = |values: &[f64]| {
            (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
        };
        let phase_scores: Vec<f64> = phases.iter().map(|p| p.score).collect();

        Self {
            task_count: traces.len(),
            tasks_failed: traces.iter().filter(|t| t.error.is_some()).count(),
            success_rate: summary.success_rate,
            p50_ms: summary.p50_ms,
            p90_ms: summary.p90_ms,
            p95_ms: summary.p95_ms,
            p99_ms: summary.p99_ms,
            mean_latency_ms: mean(latencies.as_slice()),
            phase_count: phases.len(),
            phases_passed: phases
                .iter()
                .filter(|p| p.status == PhaseStatus::Pass)
                .count(),
            mean_phase_score: mean(phase_scores.as_slice()),
        }
    }
}

/// One run's manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema: String,
    pub run_id: String,
    pub profile: String,
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub duration_ms: u64,
    pub reproducibility: Reproducibility,
    pub budget: BudgetAccounting,
    pub metrics: ManifestMetrics,
    pub phases: Vec<PhaseEntry>,
    pub artifacts: ArtifactIndex,
}

/// Inputs that do not come from the run output itself.
pub struct ManifestContext<'a> {
    pub layout: &'a WorkspaceLayout,
    pub config: &'a LoadedConfig,
    pub metadata: &'a dyn MetadataProvider,
    /// Suite file, if the run loaded one.
    pub suite_path: Option<&'a Path>,
    /// Endpoint and model of the chat client, real mode only.
    pub endpoint: Option<(String, String)>,
    pub seed: Option<u64>,
}

impl RunManifest {
    /// Assemble a manifest. Pure apart from best-effort metadata lookups.
    pub fn build(output: &RunOutput, artifacts: &RunArtifacts, ctx: &ManifestContext<'_>) -> Self {
        let layout = ctx.layout;
        let (endpoint, model) = match &ctx.endpoint {
            Some((endpoint, model)) => (
                MetadataValue::from(Some(endpoint.clone())),
                MetadataValue::from(Some(model.clone())),
            ),
            None => (MetadataValue::Absent, MetadataValue::Absent),
        };

        let reproducibility = Reproducibility {
            git_revision: ctx.metadata.revision(),
            config_path: ctx.config.path.as_deref().map(|p| layout.relative(p)),
            config_fingerprint: ctx.config.fingerprint.clone().into(),
            suite_path: ctx.suite_path.map(|p| layout.relative(p)),
            suite_sha256: ctx
                .suite_path
                .map(|p| ctx.metadata.file_digest(p))
                .unwrap_or_default(),
            endpoint,
            model,
            seed: ctx.seed,
        };

        Self {
            schema: MANIFEST_SCHEMA.to_string(),
            run_id: output.run_key.clone(),
            profile: output.profile.clone(),
            timestamp: output.timestamp,
            mode: output.mode.clone(),
            duration_ms: output.duration_ms,
            reproducibility,
            budget: output.budget.clone(),
            metrics: ManifestMetrics::compute(&output.task_traces, &output.phase_entries),
            phases: output.phase_entries.clone(),
            artifacts: artifacts.index(layout, !output.task_traces.is_empty()),
        }
    }

    /// Write the profile manifest and the run-scoped copy.
    pub fn write(&self, artifacts: &RunArtifacts) -> Result<()> {
        write_json(&artifacts.manifest, self)?;
        write_json(&artifacts.run_manifest, self)?;
        obs::emit_manifest_written(&self.run_id, &artifacts.run_manifest);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| BenchError::ResultFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| BenchError::ResultFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
