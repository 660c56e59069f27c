//! Deduplicating merge of result logs written by concurrent runs.
//!
//! Inputs are concatenated in order (base, ours, theirs) and the first row
//! seen for each key wins. The key is `run_id` (any non-null scalar), or
//! `profile|timestamp|phase` when `run_id` is missing. Rows with neither are
//! always kept.

use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::domain::error::Result;
use crate::metrics::METRICS;
use crate::obs;
use crate::result_file::{read_rows_lenient, write_json};

/// Outcome counts of one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Object rows read across all inputs.
    pub inputs: usize,
    pub merged: usize,
    /// Duplicate keys dropped.
    pub duplicates: usize,
    /// Non-object rows dropped.
    pub discarded: usize,
}

/// Merge key of a row, if it has one.
pub fn merge_key(row: &Value) -> Option<String> {
    let obj = row.as_object()?;
    let non_empty = |field: &str| {
        obj.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    match obj.get("run_id") {
        Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => return Some(v.to_string()),
        _ => {}
    }
    match (non_empty("profile"), non_empty("timestamp"), non_empty("phase")) {
        (Some(profile), Some(timestamp), Some(phase)) => {
            Some(format!("{profile}|{timestamp}|{phase}"))
        }
        _ => None,
    }
}

/// Merge row lists, keeping the first occurrence of each key.
pub fn merge_rows(base: Vec<Value>, ours: Vec<Value>, theirs: Vec<Value>) -> (Vec<Value>, MergeStats) {
    let mut seen = HashSet::new();
    let mut stats = MergeStats::default();
    let mut merged = Vec::new();

    for row in base.into_iter().chain(ours).chain(theirs) {
        if !row.is_object() {
            stats.discarded += 1;
            continue;
        }
        stats.inputs += 1;
        let Some(key) = merge_key(&row) else {
            merged.push(row);
            continue;
        };
        if seen.insert(key) {
            merged.push(row);
        } else {
            stats.duplicates += 1;
        }
    }

    stats.merged = merged.len();
    (merged, stats)
}

/// Three-way file merge in git merge-driver form: the result replaces `ours`.
///
/// Unreadable or non-array inputs count as empty.
pub fn merge_files(base: &Path, ours: &Path, theirs: &Path) -> Result<MergeStats> {
    let (merged, stats) = merge_rows(
        read_rows_lenient(base),
        read_rows_lenient(ours),
        read_rows_lenient(theirs),
    );
    write_json(ours, &merged)?;

    METRICS.add_rows_deduplicated(stats.duplicates as u64);
    obs::emit_merge_completed(stats.inputs, stats.merged, stats.duplicates);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_occurrence_wins_in_order() {
        let (merged, stats) = merge_rows(
            vec![json!({"run_id": "a"})],
            vec![json!({"run_id": "a"}), json!({"run_id": "b"})],
            vec![json!({"run_id": "b"}), json!({"run_id": "c"})],
        );
        assert_eq!(
            merged,
            vec![json!({"run_id": "a"}), json!({"run_id": "b"}), json!({"run_id": "c"})]
        );
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.inputs, 5);
    }

    #[test]
    fn earlier_row_content_is_kept() {
        let (merged, _) = merge_rows(
            vec![],
            vec![json!({"run_id": "a", "score": 10.0})],
            vec![json!({"run_id": "a", "score": 99.0})],
        );
        assert_eq!(merged, vec![json!({"run_id": "a", "score": 10.0})]);
    }

    #[test]
    fn fallback_key_from_profile_timestamp_phase() {
        let row = json!({"profile": "p", "timestamp": "t", "phase": "Strength"});
        assert_eq!(merge_key(&row).as_deref(), Some("p|t|Strength"));

        let (merged, _) = merge_rows(vec![row.clone()], vec![row.clone()], vec![]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn keyless_rows_are_always_kept() {
        let row = json!({"note": "free-form"});
        assert_eq!(merge_key(&row), None);
        let (merged, stats) = merge_rows(vec![row.clone()], vec![row.clone()], vec![row]);
        assert_eq!(merged.len(), 3);
        assert_eq!(stats.duplicates, 0);
    }

    #[test]
    fn non_objects_are_dropped() {
        let (merged, stats) = merge_rows(vec![json!(1), json!("x")], vec![json!({"run_id": "a"})], vec![]);
        assert_eq!(merged, vec![json!({"run_id": "a"})]);
        assert_eq!(stats.discarded, 2);
    }

    #[test]
    fn numeric_run_ids_are_keys() {
        assert_eq!(merge_key(&json!({"run_id": 7})).as_deref(), Some("7"));
        assert_eq!(merge_key(&json!({"run_id": null})), None);

        let (merged, stats) = merge_rows(
            vec![json!({"run_id": 1})],
            vec![json!({"run_id": 1, "score": 5.0})],
            vec![],
        );
        assert_eq!(merged, vec![json!({"run_id": 1})]);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn merging_with_itself_is_stable() {
        let log = vec![json!({"run_id": "a"}), json!({"run_id": "b"})];
        let (merged, _) = merge_rows(log.clone(), log.clone(), log.clone());
        assert_eq!(merged, log);
    }
}
