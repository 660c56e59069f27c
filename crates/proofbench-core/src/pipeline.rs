//! End-to-end flows used by the CLI: run a profile and persist its evidence,
//! or assemble a proof pack from what is already on disk.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use proofbench_llm::ChatClient;

use crate::artifacts::RunArtifacts;
use crate::config::{LoadedConfig, WorkspaceLayout};
use crate::domain::error::Result;
use crate::domain::task::Suite;
use crate::manifest::{ManifestContext, RunManifest};
use crate::metadata::MetadataProvider;
use crate::percentile::LatencySummary;
use crate::proof_pack::{
    build_pack, write_checksums, write_latest, write_summary_csv, LatestSelection,
};
use crate::runner::{ExecutionMode, RunOutput, TaskRunner};

/// What to run.
pub struct RunRequest {
    pub profile: String,
    pub client: Option<Arc<dyn ChatClient>>,
    /// Overrides the profile's suite.
    pub suite: Option<PathBuf>,
    /// Overrides the profile's seed.
    pub seed: Option<u64>,
    /// Pins the run timestamp; now when unset.
    pub timestamp: Option<DateTime<Utc>>,
}

impl RunRequest {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            client: None,
            suite: None,
            seed: None,
            timestamp: None,
        }
    }
}

/// A finished run and where its evidence went.
#[derive(Debug, Clone)]
pub struct RunReceipt {
    pub output: RunOutput,
    pub artifacts: RunArtifacts,
    pub manifest: RunManifest,
}

/// Run a profile and write its results, log, summary and manifests.
///
/// An unknown profile or an unreadable suite fails before any task runs.
pub async fn run_profile(
    layout: &WorkspaceLayout,
    config: &LoadedConfig,
    request: RunRequest,
    metadata: &dyn MetadataProvider,
) -> Result<RunReceipt> {
    let profile = config.profile(&request.profile)?;
    let suite_path = request
        .suite
        .or_else(|| profile.suite.clone())
        .map(|p| layout.resolve(&p));
    let suite = match &suite_path {
        Some(path) => Suite::load(path)?,
        None => Suite::default(),
    };
    let seed = request.seed.or(profile.seed);

    let mode = ExecutionMode::select(request.client, &suite, seed);
    let endpoint = match &mode {
        ExecutionMode::Real(client) => {
            Some((client.endpoint().to_string(), client.model().to_string()))
        }
        ExecutionMode::Synthetic { .. } => None,
    };

    let mut runner =
        TaskRunner::new(request.profile.clone(), mode).with_settings(profile.run_settings());
    if let Some(ts) = request.timestamp {
        runner = runner.with_timestamp(ts);
    }
    let output = runner.run(&suite).await;

    let artifacts = RunArtifacts::plan(layout, &output);
    artifacts.write_outputs(&output)?;

    let ctx = ManifestContext {
        layout,
        config,
        metadata,
        suite_path: suite_path.as_deref(),
        endpoint,
        seed,
    };
    let manifest = RunManifest::build(&output, &artifacts, &ctx);
    manifest.write(&artifacts)?;

    Ok(RunReceipt {
        output,
        artifacts,
        manifest,
    })
}

/// Outputs of proof-pack assembly.
#[derive(Debug, Clone)]
pub struct PackReceipt {
    pub latest: LatestSelection,
    pub summary: LatencySummary,
    pub pack: PathBuf,
    pub checksums: PathBuf,
}

/// Normalize the latest results, summarize them, pack and checksum.
pub fn assemble_pack(layout: &WorkspaceLayout, profile: Option<&str>) -> Result<PackReceipt> {
    let latest = write_latest(layout, profile)?;
    let summary = write_summary_csv(layout)?;
    let pack = build_pack(layout)?;
    let checksums = write_checksums(layout)?;
    Ok(PackReceipt {
        latest,
        summary,
        pack,
        checksums,
    })
}
