//! Benchmark configuration and workspace layout.
//!
//! A config file is JSON, or TOML when its extension is `.toml`. It names the
//! artifact directories and a table of profiles:
//!
//! ```toml
//! results_dir = "results"
//!
//! [profiles.nightly]
//! suite = "suites/nightly.json"
//! seed = 7
//! budget_usd = 10.0
//! cost_per_task_usd = 0.05
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::budget::BudgetPlan;
use crate::domain::digest;
use crate::domain::error::{BenchError, Result};
use crate::runner::{RunSettings, DEFAULT_TASK_TIMEOUT_SECS};

fn default_results_dir() -> String {
    "results".to_string()
}
fn default_manifests_dir() -> String {
    "manifests".to_string()
}
fn default_logs_dir() -> String {
    "logs".to_string()
}
fn default_reports_dir() -> String {
    "reports".to_string()
}
fn default_dist_dir() -> String {
    "dist".to_string()
}
fn default_max_tokens() -> u32 {
    256
}
fn default_temperature() -> f32 {
    0.2
}
fn default_task_timeout_secs() -> u64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

/// Execution parameters of one named profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Suite file, relative to the workspace root.
    #[serde(default)]
    pub suite: Option<PathBuf>,
    #[serde(default)]
    pub target_tasks: Option<u64>,
    #[serde(default)]
    pub cost_per_task_usd: Option<f64>,
    #[serde(default)]
    pub budget_usd: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            suite: None,
            target_tasks: None,
            cost_per_task_usd: None,
            budget_usd: None,
            seed: None,
            system_prompt: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

impl ProfileConfig {
    pub fn budget_plan(&self) -> BudgetPlan {
        BudgetPlan {
            target_tasks: self.target_tasks,
            cost_per_task_usd: self.cost_per_task_usd,
            budget_usd: self.budget_usd,
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            system_prompt: self.system_prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            budget: self.budget_plan(),
        }
    }
}

/// Top-level benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    #[serde(default = "default_manifests_dir")]
    pub manifests_dir: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            manifests_dir: default_manifests_dir(),
            logs_dir: default_logs_dir(),
            reports_dir: default_reports_dir(),
            dist_dir: default_dist_dir(),
            profiles: BTreeMap::new(),
        }
    }
}

/// A parsed config plus where it came from and its content fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: BenchConfig,
    /// SHA-256 of the canonical JSON form; `None` without a config file.
    pub fingerprint: Option<String>,
}

impl LoadedConfig {
    /// Built-in defaults, used when no config file is given.
    pub fn builtin() -> Self {
        Self {
            path: None,
            config: BenchConfig::default(),
            fingerprint: None,
        }
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| BenchError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&raw, path)
    }

    /// Parse config text; the format is picked from `origin`'s extension.
    pub fn parse(raw: &str, origin: &Path) -> Result<Self> {
        let invalid = |reason: String| BenchError::Config {
            path: origin.to_path_buf(),
            reason,
        };

        let is_toml = origin
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let value: Value = if is_toml {
            toml::from_str(raw).map_err(|e| invalid(e.to_string()))?
        } else {
            serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?
        };

        let fingerprint = digest::fingerprint(&value)?;
        let config: BenchConfig =
            serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            path: Some(origin.to_path_buf()),
            config,
            fingerprint: Some(fingerprint),
        })
    }

    /// Look up a profile.
    ///
    /// With a config file, an unknown profile is an error. Without one,
    /// every profile name runs with default settings.
    pub fn profile(&self, name: &str) -> Result<ProfileConfig> {
        match (&self.path, self.config.profiles.get(name)) {
            (_, Some(profile)) => Ok(profile.clone()),
            (None, None) => Ok(ProfileConfig::default()),
            (Some(path), None) => Err(BenchError::ProfileNotFound {
                profile: name.to_string(),
                path: path.clone(),
            }),
        }
    }
}

/// Artifact directories resolved against a workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub results: PathBuf,
    pub manifests: PathBuf,
    pub logs: PathBuf,
    pub reports: PathBuf,
    pub dist: PathBuf,
}

impl WorkspaceLayout {
    /// Default directory names under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(root, &BenchConfig::default())
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &BenchConfig) -> Self {
        let root = root.into();
        Self {
            results: root.join(&config.results_dir),
            manifests: root.join(&config.manifests_dir),
            logs: root.join(&config.logs_dir),
            reports: root.join(&config.reports_dir),
            dist: root.join(&config.dist_dir),
            root,
        }
    }

    /// Resolve a path relative to the root; absolute paths pass through.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Path relative to the root, with `/` separators, for manifests and
    /// archive entries.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_share_a_fingerprint() {
        let toml_src = r#"
results_dir = "results"

[profiles.nightly]
seed = 7
budget_usd = 10.0
"#;
        let json_src = r#"{"profiles": {"nightly": {"budget_usd": 10, "seed": 7}}, "results_dir": "results"}"#;

        let a = LoadedConfig::parse(toml_src, Path::new("bench.toml")).expect("toml");
        let b = LoadedConfig::parse(json_src, Path::new("bench.json")).expect("json");
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.config, b.config);
    }

    #[test]
    fn profile_defaults() {
        let cfg = LoadedConfig::parse(r#"{"profiles": {"p": {}}}"#, Path::new("c.json"))
            .expect("parse");
        let p = cfg.profile("p").expect("profile");
        assert_eq!(p.max_tokens, 256);
        assert_eq!(p.temperature, 0.2);
        assert_eq!(p.task_timeout_secs, 60);
        assert_eq!(cfg.config.logs_dir, "logs");
    }

    #[test]
    fn unknown_profile_is_an_error_with_config() {
        let cfg = LoadedConfig::parse(r#"{"profiles": {}}"#, Path::new("c.json")).expect("parse");
        let err = cfg.profile("missing").unwrap_err();
        assert!(matches!(err, BenchError::ProfileNotFound { ref profile, .. } if profile == "missing"));
        assert!(err.to_string().contains("c.json"));
    }

    #[test]
    fn builtin_config_accepts_any_profile() {
        let cfg = LoadedConfig::builtin();
        assert_eq!(cfg.profile("adhoc").expect("profile"), ProfileConfig::default());
        assert_eq!(cfg.fingerprint, None);
    }

    #[test]
    fn bad_config_names_the_file() {
        let err = LoadedConfig::parse("{not json", Path::new("broken.json")).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn layout_relative_paths() {
        let layout = WorkspaceLayout::new("/work");
        assert_eq!(layout.results, PathBuf::from("/work/results"));
        assert_eq!(
            layout.relative(&layout.manifests.join("p.json")),
            "manifests/p.json"
        );
        assert_eq!(layout.resolve(Path::new("s.json")), PathBuf::from("/work/s.json"));
    }
}
