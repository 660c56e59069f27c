//! Best-effort reproducibility metadata.
//!
//! Providers never fail: anything that cannot be determined is
//! [`MetadataValue::Absent`], which manifests record as `null`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::domain::digest;
use crate::domain::error::{BenchError, Result};

/// A metadata value that may legitimately be missing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum MetadataValue {
    Present(String),
    #[default]
    Absent,
}

impl MetadataValue {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            MetadataValue::Present(v) => Some(v),
            MetadataValue::Absent => None,
        }
    }

    /// Display form; `fallback` when absent.
    pub fn or_display<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.as_deref().unwrap_or(fallback)
    }
}

impl From<Option<String>> for MetadataValue {
    fn from(v: Option<String>) -> Self {
        match v {
            Some(v) if !v.trim().is_empty() => MetadataValue::Present(v),
            _ => MetadataValue::Absent,
        }
    }
}

impl From<MetadataValue> for Option<String> {
    fn from(v: MetadataValue) -> Self {
        match v {
            MetadataValue::Present(v) => Some(v),
            MetadataValue::Absent => None,
        }
    }
}

impl<E: std::fmt::Display> From<std::result::Result<String, E>> for MetadataValue {
    fn from(r: std::result::Result<String, E>) -> Self {
        match r {
            Ok(v) => Some(v).into(),
            Err(e) => {
                tracing::debug!(error = %e, "metadata unavailable");
                MetadataValue::Absent
            }
        }
    }
}

/// Source of reproducibility metadata for a run manifest.
pub trait MetadataProvider: Send + Sync {
    /// Source-control revision of the workspace.
    fn revision(&self) -> MetadataValue;

    /// Content hash of a file.
    fn file_digest(&self, path: &Path) -> MetadataValue {
        digest::sha256_file(path).into()
    }
}

/// Reads the revision from `git rev-parse HEAD` in a directory.
#[derive(Debug, Clone)]
pub struct GitMetadata {
    repo_dir: PathBuf,
}

impl GitMetadata {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }
}

impl MetadataProvider for GitMetadata {
    fn revision(&self) -> MetadataValue {
        capture_head_sha(&self.repo_dir).into()
    }
}

/// Fixed metadata, for tests and for callers that already know the values.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    pub revision: MetadataValue,
}

impl MetadataProvider for StaticMetadata {
    fn revision(&self) -> MetadataValue {
        self.revision.clone()
    }
}

/// Capture the HEAD commit SHA of the repository containing `repo_dir`.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| BenchError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BenchError::GitError(format!(
            "git rev-parse HEAD failed: {}",
            stderr.trim()
        )));
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        return Err(BenchError::GitError(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}
