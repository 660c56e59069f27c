//! proofbench - benchmark harness for chat-completion services
//!
//! ## Commands
//!
//! - `run`: execute a profile's suite and write results, logs and manifests
//! - `merge`: three-way merge of result files (git merge-driver form)
//! - `summarize`: refresh `results/latest.jsonl` and the latency summary CSV
//! - `pack`: build the proof pack and its checksum file
//! - `verify`: re-check a checksum file
//! - `report`: write `reports/summary.json` and `reports/latest.md`
//! - `grade`: grade a single answer, for debugging scorers

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use proofbench_core::artifacts::render_text_summary;
use proofbench_core::metrics::METRICS;
use proofbench_core::proof_pack::{write_latest, write_summary_csv, CHECKSUMS_NAME};
use proofbench_core::reporting::{write_latest_manifest_md, write_results_report};
use proofbench_core::telemetry::{init_tracing, LogFormat};
use proofbench_core::{
    assemble_pack, grade, merge_files, run_profile, verify_checksums, GitMetadata, LoadedConfig,
    RunRequest, ScoringKind, WorkspaceLayout,
};
use proofbench_llm::{ChatClient, EndpointConfig, OpenAiChatClient};

#[derive(Parser)]
#[command(name = "proofbench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Graded benchmark runs with checksummed evidence", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Workspace root; artifact directories are resolved against it
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (JSON, or TOML by extension)
    #[arg(short, long, global = true, env = "PROOFBENCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a profile's suite
    Run {
        /// Profile name
        #[arg(short, long, default_value = "default")]
        profile: String,

        /// Suite file (overrides the profile's)
        #[arg(long)]
        suite: Option<PathBuf>,

        /// Seed for synthetic scoring (overrides the profile's)
        #[arg(long)]
        seed: Option<u64>,

        /// Never call the completion service
        #[arg(long)]
        synthetic: bool,

        /// Endpoint base URL (overrides OPENAI_BASE_URL / SAVI_API_BASE)
        #[arg(long)]
        base_url: Option<String>,

        /// API key (overrides OPENAI_API_KEY / SAVI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Model (overrides OPENAI_MODEL / SAVI_MODEL)
        #[arg(long)]
        model: Option<String>,
    },

    /// Merge result files; the merged list replaces OURS
    Merge {
        base: PathBuf,
        ours: PathBuf,
        theirs: PathBuf,
    },

    /// Refresh latest.jsonl and the latency summary
    Summarize {
        /// Prefer this profile's results
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Build the proof pack and checksums
    Pack {
        /// Prefer this profile's results
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Verify a checksum file
    Verify {
        /// Checksum file (default: <dist>/sha256sums.txt)
        checksums: Option<PathBuf>,
    },

    /// Write the results report and the latest manifest as Markdown
    Report,

    /// Grade one answer
    Grade {
        /// Scoring kind (exact, contains, regex, json, number, fuzzy, ...)
        #[arg(short, long, default_value = "contains")]
        kind: String,

        /// Expected answer
        #[arg(short, long)]
        expected: String,

        /// Model output
        #[arg(short, long)]
        got: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(LogFormat::resolve(cli.json), level);

    let config = match &cli.config {
        Some(path) => LoadedConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => LoadedConfig::builtin(),
    };
    let layout = WorkspaceLayout::from_config(&cli.root, &config.config);

    let result = match cli.command {
        Commands::Run {
            profile,
            suite,
            seed,
            synthetic,
            base_url,
            api_key,
            model,
        } => {
            let endpoint = EndpointOverrides {
                base_url,
                api_key,
                model,
            };
            cmd_run(&layout, &config, profile, suite, seed, synthetic, endpoint).await
        }
        Commands::Merge { base, ours, theirs } => cmd_merge(&base, &ours, &theirs),
        Commands::Summarize { profile } => cmd_summarize(&layout, profile.as_deref()),
        Commands::Pack { profile } => cmd_pack(&layout, profile.as_deref()),
        Commands::Verify { checksums } => cmd_verify(&layout, checksums.as_deref()),
        Commands::Report => cmd_report(&layout),
        Commands::Grade {
            kind,
            expected,
            got,
        } => cmd_grade(&kind, &expected, &got),
    };

    METRICS.flush();
    result
}

struct EndpointOverrides {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

/// Chat client from the environment plus CLI overrides. `None` when no
/// endpoint is configured.
fn build_client(overrides: EndpointOverrides, timeout_secs: u64) -> Option<Arc<dyn ChatClient>> {
    let mut endpoint = EndpointConfig::from_env().with_timeout_secs(timeout_secs);
    if let Some(base) = &overrides.base_url {
        endpoint = endpoint.with_base_url(base);
    }
    if let Some(key) = &overrides.api_key {
        endpoint = endpoint.with_api_key(key);
    }
    if let Some(model) = &overrides.model {
        endpoint = endpoint.with_model(model);
    }

    match OpenAiChatClient::new(endpoint) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn ChatClient>),
        Err(e) => {
            info!(reason = %e, "no completion endpoint, running synthetic");
            None
        }
    }
}

async fn cmd_run(
    layout: &WorkspaceLayout,
    config: &LoadedConfig,
    profile: String,
    suite: Option<PathBuf>,
    seed: Option<u64>,
    synthetic: bool,
    endpoint: EndpointOverrides,
) -> Result<()> {
    let profile_config = config
        .profile(&profile)
        .with_context(|| format!("cannot run profile '{profile}'"))?;

    let client = if synthetic {
        None
    } else {
        build_client(endpoint, profile_config.task_timeout_secs)
    };

    let mut request = RunRequest::new(profile.clone());
    request.client = client;
    request.suite = suite;
    request.seed = seed;

    let metadata = GitMetadata::new(&layout.root);
    let receipt = run_profile(layout, config, request, &metadata)
        .await
        .with_context(|| format!("run of profile '{profile}' failed"))?;

    print!("{}", render_text_summary(&receipt.output));
    println!(
        "manifest: {}",
        receipt.artifacts.run_manifest.display()
    );
    Ok(())
}

fn cmd_merge(base: &Path, ours: &Path, theirs: &Path) -> Result<()> {
    let stats = merge_files(base, ours, theirs)
        .with_context(|| format!("failed to merge into {}", ours.display()))?;
    println!(
        "merged {} rows ({} duplicates dropped, {} non-object rows discarded)",
        stats.merged, stats.duplicates, stats.discarded
    );
    Ok(())
}

fn cmd_summarize(layout: &WorkspaceLayout, profile: Option<&str>) -> Result<()> {
    let latest = write_latest(layout, profile).context("failed to write latest.jsonl")?;
    match &latest.source {
        Some(source) => info!(source = %source.display(), rows = latest.rows, "selected latest results"),
        None => info!("no result files found"),
    }
    let summary = write_summary_csv(layout).context("failed to write latency summary")?;
    println!("{}", proofbench_core::LatencySummary::CSV_HEADER);
    println!("{}", summary.csv_row());
    Ok(())
}

fn cmd_pack(layout: &WorkspaceLayout, profile: Option<&str>) -> Result<()> {
    let receipt = assemble_pack(layout, profile).context("failed to assemble proof pack")?;
    println!("pack: {}", receipt.pack.display());
    println!("checksums: {}", receipt.checksums.display());
    Ok(())
}

fn cmd_verify(layout: &WorkspaceLayout, checksums: Option<&Path>) -> Result<()> {
    let path = checksums
        .map(Path::to_path_buf)
        .unwrap_or_else(|| layout.dist.join(CHECKSUMS_NAME));
    let report = verify_checksums(layout, &path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    for rel in &report.verified {
        println!("OK       {rel}");
    }
    for rel in &report.mismatched {
        println!("MISMATCH {rel}");
    }
    for rel in &report.missing {
        println!("MISSING  {rel}");
    }
    if !report.is_ok() {
        bail!(
            "verification failed: {} mismatched, {} missing, {} malformed lines",
            report.mismatched.len(),
            report.missing.len(),
            report.malformed
        );
    }
    Ok(())
}

fn cmd_report(layout: &WorkspaceLayout) -> Result<()> {
    let summary = write_results_report(layout, Utc::now()).context("failed to write summary.json")?;
    println!("report: {}", summary.display());
    match write_latest_manifest_md(layout).context("failed to render latest manifest")? {
        Some(md) => println!("manifest: {}", md.display()),
        None => println!("manifest: none found"),
    }
    Ok(())
}

fn cmd_grade(kind: &str, expected: &str, got: &str) -> Result<()> {
    let kind = ScoringKind::parse(kind);
    let result = grade("", expected, got, &kind);
    let json = serde_json::to_string_pretty(&result).context("failed to serialize grade")?;
    println!("{json}");
    Ok(())
}
