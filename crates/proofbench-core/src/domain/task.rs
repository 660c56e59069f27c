//! Benchmark tasks, phases and suites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::domain::error::{BenchError, Result};

/// Execution phase a task is reported under.
///
/// Phases have a fixed order. Unrecognized names are accepted and bucketed
/// under [`Phase::Competition`], the default phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[derive(Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    WarmUp,
    Strength,
    Endurance,
    #[default]
    Competition,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 4] = [
        Phase::WarmUp,
        Phase::Strength,
        Phase::Endurance,
        Phase::Competition,
    ];

    /// Canonical display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::WarmUp => "Warm-up",
            Phase::Strength => "Strength",
            Phase::Endurance => "Endurance",
            Phase::Competition => "Competition",
        }
    }

    /// Parse a phase name, returning `None` for unknown names.
    pub fn parse_known(name: &str) -> Option<Phase> {
        match name.trim().to_lowercase().as_str() {
            "warm-up" | "warmup" | "warm_up" | "warm up" => Some(Phase::WarmUp),
            "strength" => Some(Phase::Strength),
            "endurance" => Some(Phase::Endurance),
            "competition" => Some(Phase::Competition),
            _ => None,
        }
    }

    /// Parse a phase name, bucketing unknown names under the default phase.
    pub fn parse(name: &str) -> Phase {
        Self::parse_known(name).unwrap_or_else(|| {
            tracing::debug!(phase = %name, "unknown phase bucketed under default");
            Phase::default()
        })
    }

    /// Lowercase slug used inside run identifiers.
    pub fn slug(&self) -> &'static str {
        match self {
            Phase::WarmUp => "warm-up",
            Phase::Strength => "strength",
            Phase::Endurance => "endurance",
            Phase::Competition => "competition",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Phase {
    fn from(s: String) -> Self {
        Phase::parse(&s)
    }
}

impl From<Phase> for String {
    fn from(p: Phase) -> Self {
        p.as_str().to_string()
    }
}

/// Grading strategy for a task. See [`crate::grader::grade`].
///
/// Aliases collapse onto one variant (`substring` → `Contains`, `bleu` →
/// `Fuzzy`, ...). Anything else is kept verbatim as `Unsupported` so it can
/// be reported instead of silently scored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScoringKind {
    /// Whitespace-normalized, case-folded equality.
    Exact,
    /// Byte-exact equality.
    ExactCase,
    /// Normalized substring containment.
    #[default]
    Contains,
    /// Case-insensitive multiline regex search.
    Regex,
    /// Structural JSON equality.
    JsonEqual,
    /// Numeric match within tolerance (`value[:tolerance]`).
    Number,
    /// Jaccard similarity over lower-cased word sets.
    Fuzzy,
    /// Unrecognized scorer name.
    Unsupported(String),
}

impl ScoringKind {
    pub fn parse(name: &str) -> ScoringKind {
        let normalized = name.trim().to_lowercase();
        match normalized.as_str() {
            "exact" => ScoringKind::Exact,
            "exact-case" => ScoringKind::ExactCase,
            "contains" | "substring" => ScoringKind::Contains,
            "regex" | "re" => ScoringKind::Regex,
            "json-equal" | "json" => ScoringKind::JsonEqual,
            "number" | "approx" => ScoringKind::Number,
            "fuzzy" | "bleu" | "rouge" => ScoringKind::Fuzzy,
            _ => ScoringKind::Unsupported(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ScoringKind::Exact => "exact",
            ScoringKind::ExactCase => "exact-case",
            ScoringKind::Contains => "contains",
            ScoringKind::Regex => "regex",
            ScoringKind::JsonEqual => "json-equal",
            ScoringKind::Number => "number",
            ScoringKind::Fuzzy => "fuzzy",
            ScoringKind::Unsupported(name) => name,
        }
    }
}

impl fmt::Display for ScoringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ScoringKind {
    fn from(s: String) -> Self {
        ScoringKind::parse(&s)
    }
}

impl From<ScoringKind> for String {
    fn from(k: ScoringKind) -> Self {
        k.as_str().to_string()
    }
}

/// A single benchmark task. Immutable once loaded.
///
/// The on-disk suite format names the expected answer `answer` and the
/// scoring kind `scorer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub prompt: String,
    #[serde(rename = "answer", alias = "expected_answer")]
    pub expected_answer: String,
    #[serde(rename = "scorer", alias = "scoring_kind", default)]
    pub scoring_kind: ScoringKind,
    #[serde(default)]
    pub phase: Phase,
}

impl Task {
    pub fn new(id: &str, prompt: &str, expected: &str, kind: ScoringKind, phase: Phase) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            expected_answer: expected.to_string(),
            scoring_kind: kind,
            phase,
        }
    }
}

/// Ordered collection of tasks executed in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Suite {
    pub tasks: Vec<Task>,
}

impl Suite {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut suite = Self { tasks };
        suite.fill_missing_ids();
        suite
    }

    /// Load a suite file (JSON array of task records).
    pub fn load(path: &Path) -> Result<Suite> {
        let raw = std::fs::read_to_string(path).map_err(|e| BenchError::Suite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&raw, path)
    }

    /// Parse suite JSON; `origin` is only used in error messages.
    pub fn parse(raw: &str, origin: &Path) -> Result<Suite> {
        let tasks: Vec<Task> = serde_json::from_str(raw).map_err(|e| BenchError::Suite {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Suite::new(tasks))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn fill_missing_ids(&mut self) {
        for (index, task) in self.tasks.iter_mut().enumerate() {
            if task.id.trim().is_empty() {
                task.id = format!("task-{:04}", index + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn phase_parse_is_lenient() {
        assert_eq!(Phase::parse("warm-up"), Phase::WarmUp);
        assert_eq!(Phase::parse("WarmUp"), Phase::WarmUp);
        assert_eq!(Phase::parse(" Endurance "), Phase::Endurance);
        assert_eq!(Phase::parse("finals"), Phase::Competition);
        assert_eq!(Phase::parse_known("finals"), None);
    }

    #[test]
    fn phase_order_is_fixed() {
        let mut phases = vec![Phase::Competition, Phase::WarmUp, Phase::Endurance, Phase::Strength];
        phases.sort();
        assert_eq!(phases, Phase::ALL.to_vec());
    }

    #[test]
    fn phase_serializes_as_display_name() {
        let json = serde_json::to_string(&Phase::WarmUp).expect("serialize");
        assert_eq!(json, r#""Warm-up""#);
        let back: Phase = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Phase::WarmUp);
    }

    #[test]
    fn scoring_kind_aliases() {
        assert_eq!(ScoringKind::parse("substring"), ScoringKind::Contains);
        assert_eq!(ScoringKind::parse("RE"), ScoringKind::Regex);
        assert_eq!(ScoringKind::parse("json"), ScoringKind::JsonEqual);
        assert_eq!(ScoringKind::parse("approx"), ScoringKind::Number);
        assert_eq!(ScoringKind::parse("rouge"), ScoringKind::Fuzzy);
        assert_eq!(
            ScoringKind::parse("semantic"),
            ScoringKind::Unsupported("semantic".to_string())
        );
    }

    #[test]
    fn suite_defaults_missing_fields() {
        let raw = r#"[
            {"id": "t1", "prompt": "2+2?", "answer": "4", "scorer": "number", "phase": "Warm-up"},
            {"prompt": "Capital of France?", "answer": "Paris"}
        ]"#;
        let suite = Suite::parse(raw, &PathBuf::from("suite.json")).expect("parse suite");
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.tasks[0].scoring_kind, ScoringKind::Number);
        assert_eq!(suite.tasks[0].phase, Phase::WarmUp);
        assert_eq!(suite.tasks[1].id, "task-0002");
        assert_eq!(suite.tasks[1].scoring_kind, ScoringKind::Contains);
        assert_eq!(suite.tasks[1].phase, Phase::Competition);
    }

    #[test]
    fn suite_parse_error_names_file() {
        let err = Suite::parse("{not json", &PathBuf::from("bench/suite.json")).unwrap_err();
        assert!(err.to_string().contains("bench/suite.json"));
    }
}
