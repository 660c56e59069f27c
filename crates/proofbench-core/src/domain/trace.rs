//! Task traces, phase entries and the records stored in result files.
//!
//! Both record shapes carry a `run_id`, the key the result merger
//! deduplicates on. Phase entries fall back to `(profile, timestamp, phase)`
//! when the id is missing.

use chrono::{DateTime, Utc};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::task::{Phase, Task};
use crate::grader::Grade;

/// Minimum task score counted as a pass.
pub const PASS_THRESHOLD: f64 = 60.0;

/// Minimum fraction of passing tasks for a phase to pass.
pub const PHASE_PASS_RATE: f64 = 0.6;

/// Compact UTC stamp used in run identifiers and artifact file names.
pub fn run_stamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Run-scoped key shared by every artifact of one invocation.
pub fn run_key(profile: &str, ts: &DateTime<Utc>) -> String {
    format!("{}-{}", profile, run_stamp(ts))
}

/// Retry count derived from a phase's average score.
///
/// Descriptive only; the runner never re-invokes a task.
pub fn retries_for_score(score: f64) -> u32 {
    if score >= 80.0 {
        0
    } else if score >= PASS_THRESHOLD {
        1
    } else {
        2
    }
}

/// Round to two decimals, the precision scores are reported at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Outcome of one task execution. Created once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTrace {
    /// `<profile>-<stamp>-task-<id>`.
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub got: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Phase name as an imported file spelled it, if not canonical.
    #[serde(skip)]
    pub phase_label: Option<String>,
    /// Fields not modelled here, carried through imports unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskTrace {
    /// Trace for a task whose response was received and graded.
    pub fn graded(run_key: &str, task: &Task, got: String, grade: Grade, latency_ms: f64) -> Self {
        Self {
            run_id: task_run_id(run_key, &task.id),
            id: task.id.clone(),
            phase: task.phase,
            prompt: task.prompt.clone(),
            expected: task.expected_answer.clone(),
            got,
            ok: grade.score >= PASS_THRESHOLD,
            score: grade.score,
            latency_ms: Some(latency_ms),
            note: grade.note,
            error: None,
            phase_label: None,
            extra: Map::new(),
        }
    }

    /// Trace for a task whose completion call failed.
    pub fn failed(run_key: &str, task: &Task, error: String) -> Self {
        Self {
            run_id: task_run_id(run_key, &task.id),
            id: task.id.clone(),
            phase: task.phase,
            prompt: task.prompt.clone(),
            expected: task.expected_answer.clone(),
            got: String::new(),
            score: 0.0,
            latency_ms: None,
            note: "transport-error".to_string(),
            ok: false,
            error: Some(error),
            phase_label: None,
            extra: Map::new(),
        }
    }
}

fn task_run_id(run_key: &str, task_id: &str) -> String {
    format!("{run_key}-task-{task_id}")
}

/// Pass/fail verdict of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PhaseStatus {
    #[default]
    Pass,
    Fail,
}

impl PhaseStatus {
    /// Status for a phase pass-rate (fraction of `ok` traces).
    pub fn from_pass_rate(pass_rate: f64) -> Self {
        if pass_rate >= PHASE_PASS_RATE {
            PhaseStatus::Pass
        } else {
            PhaseStatus::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Pass => "pass",
            PhaseStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PhaseStatus {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("pass") {
            PhaseStatus::Pass
        } else {
            PhaseStatus::Fail
        }
    }
}

impl From<PhaseStatus> for String {
    fn from(s: PhaseStatus) -> Self {
        s.as_str().to_string()
    }
}

/// Aggregate over all traces of one phase within one run.
///
/// Missing fields default on import so older producers stay readable:
/// `timestamp` → now, `status` → pass, `score` → 0.0, `retries` → 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseEntry {
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub trace: String,
    /// Phase name as an imported file spelled it, if not canonical.
    #[serde(skip)]
    pub phase_label: Option<String>,
    /// Fields not modelled here, carried through imports unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PhaseEntry {
    /// `<profile>-<stamp>-<phase>`: globally unique per phase per run.
    pub fn make_run_id(profile: &str, timestamp: &DateTime<Utc>, phase: Phase) -> String {
        format!("{}-{}", run_key(profile, timestamp), phase.slug())
    }

    /// Fill `run_id` from `(profile, timestamp, phase)` when absent.
    pub fn ensure_run_id(&mut self) {
        if self.run_id.trim().is_empty() {
            self.run_id = Self::make_run_id(&self.profile, &self.timestamp, self.phase);
        }
    }
}

/// One row of a structured result file.
///
/// Serializes to the flat object it was read from: unknown fields and a
/// non-canonical phase spelling are written back as imported.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRecord {
    Task(TaskTrace),
    Phase(PhaseEntry),
}

/// Fields only a task trace carries.
const TASK_ONLY_FIELDS: [&str; 4] = ["got", "expected", "ok", "latency_ms"];

impl ResultRecord {
    /// Classify and decode one JSON object, applying import defaults.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let is_task = value
            .as_object()
            .map(|obj| TASK_ONLY_FIELDS.iter().any(|f| obj.contains_key(*f)))
            .unwrap_or(false);

        let label = value
            .get("phase")
            .and_then(Value::as_str)
            .map(str::to_string);

        if is_task {
            let mut trace: TaskTrace = serde_json::from_value(value)?;
            trace.phase_label = label.filter(|l| l != trace.phase.as_str());
            Ok(ResultRecord::Task(trace))
        } else {
            let mut entry: PhaseEntry = serde_json::from_value(value)?;
            entry.ensure_run_id();
            entry.phase_label = label.filter(|l| l != entry.phase.as_str());
            Ok(ResultRecord::Phase(entry))
        }
    }

    fn phase_label(&self) -> Option<&str> {
        match self {
            ResultRecord::Task(t) => t.phase_label.as_deref(),
            ResultRecord::Phase(p) => p.phase_label.as_deref(),
        }
    }

    /// The record as a JSON object, phase spelling restored.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut value = match self {
            ResultRecord::Task(t) => serde_json::to_value(t)?,
            ResultRecord::Phase(p) => serde_json::to_value(p)?,
        };
        if let (Some(label), Some(obj)) = (self.phase_label(), value.as_object_mut()) {
            obj.insert("phase".to_string(), Value::String(label.to_string()));
        }
        Ok(value)
    }

    pub fn run_id(&self) -> &str {
        match self {
            ResultRecord::Task(t) => &t.run_id,
            ResultRecord::Phase(p) => &p.run_id,
        }
    }
}

impl Serialize for ResultRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl From<TaskTrace> for ResultRecord {
    fn from(t: TaskTrace) -> Self {
        ResultRecord::Task(t)
    }
}

impl From<PhaseEntry> for ResultRecord {
    fn from(p: PhaseEntry) -> Self {
        ResultRecord::Phase(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::ScoringKind;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:30:05Z")
            .expect("parse RFC3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn retries_step_function() {
        assert_eq!(retries_for_score(95.0), 0);
        assert_eq!(retries_for_score(80.0), 0);
        assert_eq!(retries_for_score(79.99), 1);
        assert_eq!(retries_for_score(60.0), 1);
        assert_eq!(retries_for_score(59.9), 2);
    }

    #[test]
    fn status_threshold_is_inclusive() {
        assert_eq!(PhaseStatus::from_pass_rate(0.6), PhaseStatus::Pass);
        assert_eq!(PhaseStatus::from_pass_rate(0.59), PhaseStatus::Fail);
    }

    #[test]
    fn phase_run_id_is_profile_stamp_phase() {
        let id = PhaseEntry::make_run_id("nightly", &ts(), Phase::WarmUp);
        assert_eq!(id, "nightly-20260301T123005Z-warm-up");
    }

    #[test]
    fn graded_trace_ok_follows_threshold() {
        let task = Task::new("t1", "q", "a", ScoringKind::Exact, Phase::Strength);
        let pass = TaskTrace::graded(
            "p-1",
            &task,
            "a".into(),
            Grade::new(60.0, "exact"),
            12.5,
        );
        assert!(pass.ok);
        assert_eq!(pass.run_id, "p-1-task-t1");

        let fail = TaskTrace::graded("p-1", &task, "b".into(), Grade::new(59.0, "x"), 1.0);
        assert!(!fail.ok);
    }

    #[test]
    fn failed_trace_scores_zero() {
        let task = Task::new("t2", "q", "a", ScoringKind::Contains, Phase::Endurance);
        let trace = TaskTrace::failed("p-1", &task, "timed out".into());
        assert_eq!(trace.score, 0.0);
        assert!(!trace.ok);
        assert_eq!(trace.error.as_deref(), Some("timed out"));
        assert_eq!(trace.latency_ms, None);
    }

    #[test]
    fn phase_entry_import_defaults() {
        let record = ResultRecord::from_value(json!({
            "profile": "legacy",
            "phase": "Strength",
            "timestamp": "2026-03-01T12:30:05Z"
        }))
        .expect("decode");
        let ResultRecord::Phase(entry) = record else {
            panic!("expected phase entry");
        };
        assert_eq!(entry.status, PhaseStatus::Pass);
        assert_eq!(entry.score, 0.0);
        assert_eq!(entry.retries, 0);
        assert_eq!(entry.run_id, "legacy-20260301T123005Z-strength");
    }

    #[test]
    fn import_keeps_unknown_phase_and_extra_fields() {
        let raw = json!({
            "run_id": "p-20260101T000000Z-finals",
            "profile": "p",
            "phase": "Finals",
            "timestamp": "2026-01-01T00:00:00Z",
            "score": 81.0,
            "kind": "record",
            "host": "ci-7"
        });
        let record = ResultRecord::from_value(raw).expect("decode");
        let ResultRecord::Phase(entry) = &record else {
            panic!("expected phase entry");
        };
        assert_eq!(entry.phase, Phase::Competition);
        assert_eq!(entry.extra.get("host"), Some(&json!("ci-7")));

        let back = record.to_value().expect("encode");
        assert_eq!(back["phase"], json!("Finals"));
        assert_eq!(back["kind"], json!("record"));
        assert_eq!(back["host"], json!("ci-7"));
    }

    #[test]
    fn canonical_phase_needs_no_label() {
        let record = ResultRecord::from_value(json!({"profile": "p", "phase": "Strength"}))
            .expect("decode");
        let ResultRecord::Phase(entry) = record else {
            panic!("expected phase entry");
        };
        assert_eq!(entry.phase_label, None);
    }

    #[test]
    fn task_shape_detected_by_fields() {
        let record = ResultRecord::from_value(json!({
            "run_id": "r-task-1", "id": "1", "got": "x", "score": 100.0, "ok": true
        }))
        .expect("decode");
        assert!(matches!(record, ResultRecord::Task(_)));
        assert_eq!(record.run_id(), "r-task-1");
    }
}
