//! Evidence bundle assembly and verification.
//!
//! Steps, each usable on its own:
//! 1. [`write_latest`] normalizes the newest result file into
//!    `results/latest.jsonl`.
//! 2. [`summarize_rows`] computes the fixed-column latency summary written to
//!    `results/latency_summary.csv`.
//! 3. [`build_pack`] tars and gzips logs, manifests, reports and the two
//!    summary artifacts into `dist/proof_pack_FULL.tgz`.
//! 4. [`write_checksums`] lists a SHA-256 per top-level artifact in
//!    `dist/sha256sums.txt`; [`verify_checksums`] re-checks them.

use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::WorkspaceLayout;
use crate::domain::digest::sha256_file;
use crate::domain::error::{BenchError, Result};
use crate::domain::trace::PASS_THRESHOLD;
use crate::obs;
use crate::percentile::LatencySummary;
use crate::result_file::{read_jsonl, read_records, write_jsonl, write_text};

pub const LATEST_JSONL: &str = "latest.jsonl";
pub const SUMMARY_CSV: &str = "latency_summary.csv";
pub const PACK_NAME: &str = "proof_pack_FULL.tgz";
pub const CHECKSUMS_NAME: &str = "sha256sums.txt";

/// Where `latest.jsonl` came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestSelection {
    pub source: Option<PathBuf>,
    pub rows: usize,
}

/// Newest file in `dir` whose name passes `matches` (mtime, then name).
pub(crate) fn newest(dir: &Path, matches: impl Fn(&str) -> bool) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !matches(&name) {
                return None;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, name, entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, _, path)| path)
}

/// Rows of a result file with import defaults applied. An unreadable or
/// invalid file contributes nothing.
fn load_rows(path: &Path) -> Vec<Value> {
    let records = match read_records(path) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "result file skipped");
            return Vec::new();
        }
    };
    records
        .iter()
        .filter_map(|record| match record.to_value() {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(run_id = record.run_id(), error = %e, "result record not encodable");
                None
            }
        })
        .collect()
}

fn tag_kind(rows: Vec<Value>, kind: &str) -> Vec<Value> {
    rows.into_iter()
        .map(|mut row| {
            if let Some(obj) = row.as_object_mut() {
                obj.entry("kind")
                    .or_insert_with(|| Value::String(kind.to_string()));
            }
            row
        })
        .collect()
}

/// Newest result file and the `kind` tag its rows get.
///
/// Preference: task traces of `profile`, any task traces, phase results of
/// `profile`, any result file.
pub fn select_latest(results_dir: &Path, profile: Option<&str>) -> Option<(PathBuf, &'static str)> {
    let is_json = |name: &str| name.ends_with(".json");

    if let Some(profile) = profile {
        let prefix = format!("tasks-{profile}-");
        if let Some(path) = newest(results_dir, |n| is_json(n) && n.starts_with(&prefix)) {
            return Some((path, "task"));
        }
    }
    if let Some(path) = newest(results_dir, |n| is_json(n) && n.starts_with("tasks-")) {
        return Some((path, "task"));
    }
    if let Some(profile) = profile {
        let prefix = format!("{profile}-");
        if let Some(path) = newest(results_dir, |n| is_json(n) && n.starts_with(&prefix)) {
            return Some((path, "record"));
        }
    }
    newest(results_dir, is_json).map(|path| (path, "record"))
}

/// Write `results/latest.jsonl` from the newest result file.
pub fn write_latest(layout: &WorkspaceLayout, profile: Option<&str>) -> Result<LatestSelection> {
    let target = layout.results.join(LATEST_JSONL);
    let (source, rows) = match select_latest(&layout.results, profile) {
        Some((path, kind)) => {
            let rows = tag_kind(load_rows(&path), kind);
            (Some(path), rows)
        }
        None => {
            debug!(dir = %layout.results.display(), "no result files, writing empty latest.jsonl");
            (None, Vec::new())
        }
    };
    write_jsonl(&target, &rows)?;
    Ok(LatestSelection {
        source,
        rows: rows.len(),
    })
}

fn latency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"avg latency=([0-9]+(?:\.[0-9]+)?)ms").expect("latency pattern is valid")
    })
}

/// Latency of a row: `latency_ms`, else parsed from the `trace` text.
pub fn row_latency(row: &Value) -> Option<f64> {
    if let Some(ms) = row.get("latency_ms").and_then(Value::as_f64) {
        return Some(ms);
    }
    let trace = row.get("trace").and_then(Value::as_str)?;
    latency_pattern()
        .captures(trace)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Success verdict of a row: `ok`, else `status == "pass"`, else
/// `score >= 60`. `None` when the row has none of these.
pub fn row_success(row: &Value) -> Option<bool> {
    if let Some(ok) = row.get("ok").and_then(Value::as_bool) {
        return Some(ok);
    }
    if let Some(status) = row.get("status").and_then(Value::as_str) {
        return Some(status.trim().eq_ignore_ascii_case("pass"));
    }
    row.get("score")
        .and_then(Value::as_f64)
        .map(|score| score >= PASS_THRESHOLD)
}

pub fn summarize_rows(rows: &[Value]) -> LatencySummary {
    let latencies = rows.iter().filter_map(row_latency);
    let outcomes: Vec<bool> = rows.iter().filter_map(row_success).collect();
    LatencySummary::compute(latencies, &outcomes)
}

/// Summarize `results/latest.jsonl` into `results/latency_summary.csv`.
pub fn write_summary_csv(layout: &WorkspaceLayout) -> Result<LatencySummary> {
    let rows = read_jsonl(&layout.results.join(LATEST_JSONL));
    let summary = summarize_rows(&rows);
    let csv = format!("{}\n{}\n", LatencySummary::CSV_HEADER, summary.csv_row());
    write_text(&layout.results.join(SUMMARY_CSV), &csv)?;
    Ok(summary)
}

/// One archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackEntry {
    File { archive_path: String, source: PathBuf },
    /// Placeholder for a directory that does not exist.
    Placeholder { archive_path: String },
}

impl PackEntry {
    pub fn archive_path(&self) -> &str {
        match self {
            PackEntry::File { archive_path, .. } | PackEntry::Placeholder { archive_path } => {
                archive_path
            }
        }
    }
}

/// Archive members in order: the files of each evidence directory (sorted),
/// then the two summary artifacts.
pub fn plan_pack(layout: &WorkspaceLayout) -> Vec<PackEntry> {
    let mut entries = Vec::new();
    for dir in [&layout.logs, &layout.manifests, &layout.reports] {
        if !dir.is_dir() {
            entries.push(PackEntry::Placeholder {
                archive_path: format!("{}/.empty", layout.relative(dir)),
            });
            continue;
        }
        let mut files: Vec<PackEntry> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| PackEntry::File {
                archive_path: layout.relative(entry.path()),
                source: entry.path().to_path_buf(),
            })
            .collect();
        files.sort_by(|a, b| a.archive_path().cmp(b.archive_path()));
        entries.extend(files);
    }
    for name in [LATEST_JSONL, SUMMARY_CSV] {
        let source = layout.results.join(name);
        if source.is_file() {
            entries.push(PackEntry::File {
                archive_path: layout.relative(&source),
                source,
            });
        }
    }
    entries
}

fn tar_header(size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_size(size);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_entry_type(tar::EntryType::Regular);
    header
}

/// Write `dist/proof_pack_FULL.tgz`. Member metadata is fixed so identical
/// inputs give an identical archive.
pub fn build_pack(layout: &WorkspaceLayout) -> Result<PathBuf> {
    std::fs::create_dir_all(&layout.dist).map_err(|e| BenchError::write(&layout.dist, e))?;
    let pack_path = layout.dist.join(PACK_NAME);
    let entries = plan_pack(layout);

    let file = std::fs::File::create(&pack_path).map_err(|e| BenchError::write(&pack_path, e))?;
    let mut archive = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    let to_write = |e: std::io::Error| BenchError::write(&pack_path, e);

    for entry in &entries {
        match entry {
            PackEntry::File {
                archive_path,
                source,
            } => {
                let data = std::fs::read(source)?;
                let mut header = tar_header(data.len() as u64);
                archive
                    .append_data(&mut header, archive_path, data.as_slice())
                    .map_err(to_write)?;
            }
            PackEntry::Placeholder { archive_path } => {
                let mut header = tar_header(0);
                archive
                    .append_data(&mut header, archive_path, std::io::empty())
                    .map_err(to_write)?;
            }
        }
    }

    archive
        .into_inner()
        .and_then(|gz| gz.finish())
        .map_err(to_write)?;
    obs::emit_pack_built(&pack_path, entries.len());
    Ok(pack_path)
}

/// Files listed in the checksum manifest, when present.
pub fn checksum_targets(layout: &WorkspaceLayout) -> Vec<PathBuf> {
    [
        layout.dist.join(PACK_NAME),
        layout.results.join(SUMMARY_CSV),
        layout.results.join(LATEST_JSONL),
        layout.reports.join("latest.html"),
        layout.reports.join("latest.md"),
    ]
    .into_iter()
    .filter(|p| p.is_file())
    .collect()
}

/// Write `dist/sha256sums.txt` (`<hex>  <relative-path>` per line).
/// Files that cannot be read are skipped.
pub fn write_checksums(layout: &WorkspaceLayout) -> Result<PathBuf> {
    let mut out = String::new();
    for path in checksum_targets(layout) {
        match sha256_file(&path) {
            Ok(hex) => out.push_str(&format!("{}  {}\n", hex, layout.relative(&path))),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable artifact"),
        }
    }
    let target = layout.dist.join(CHECKSUMS_NAME);
    write_text(&target, &out)?;
    Ok(target)
}

/// Result of re-checking a checksum manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub verified: Vec<String>,
    pub mismatched: Vec<String>,
    pub missing: Vec<String>,
    /// Lines that are not `<hex>  <path>`.
    pub malformed: usize,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty() && self.malformed == 0
    }
}

/// Recompute every digest listed in `checksums` (paths relative to the root).
pub fn verify_checksums(layout: &WorkspaceLayout, checksums: &Path) -> Result<VerifyReport> {
    let raw = std::fs::read_to_string(checksums).map_err(|e| BenchError::ResultFile {
        path: checksums.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut report = VerifyReport::default();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let Some((expected, rel)) = line.split_once("  ") else {
            report.malformed += 1;
            continue;
        };
        let rel = rel.trim().to_string();
        let path = layout.resolve(Path::new(&rel));
        match sha256_file(&path) {
            Ok(actual) if actual.eq_ignore_ascii_case(expected.trim()) => report.verified.push(rel),
            Ok(_) => report.mismatched.push(rel),
            Err(_) => report.missing.push(rel),
        }
    }
    Ok(report)
}
