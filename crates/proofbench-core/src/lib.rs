//! proofbench core library
//!
//! Grading, suite execution, aggregation, result merging and evidence
//! packaging for chat-completion benchmarks.

pub mod artifacts;
pub mod budget;
pub mod config;
pub mod domain;
pub mod grader;
pub mod manifest;
pub mod merge;
pub mod metadata;
pub mod metrics;
pub mod obs;
pub mod percentile;
pub mod pipeline;
pub mod proof_pack;
pub mod reporting;
pub mod result_file;
pub mod runner;
pub mod synthetic;
pub mod telemetry;

pub use domain::{
    BenchError, Phase, PhaseEntry, PhaseStatus, ResultRecord, Result, ScoringKind, Suite, Task,
    TaskTrace,
};

pub use artifacts::{ArtifactIndex, RunArtifacts};
pub use budget::{BudgetAccounting, BudgetPlan};
pub use config::{BenchConfig, LoadedConfig, ProfileConfig, WorkspaceLayout};
pub use grader::{grade, Grade};
pub use manifest::{ManifestContext, ManifestMetrics, RunManifest};
pub use merge::{merge_files, merge_rows, MergeStats};
pub use metadata::{GitMetadata, MetadataProvider, MetadataValue, StaticMetadata};
pub use percentile::{percentile, LatencySummary};
pub use pipeline::{assemble_pack, run_profile, PackReceipt, RunReceipt, RunRequest};
pub use proof_pack::{verify_checksums, VerifyReport};
pub use runner::{ExecutionMode, PhaseAggregate, RunOutput, RunSettings, TaskRunner};
