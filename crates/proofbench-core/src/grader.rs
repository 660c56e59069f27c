//! Scoring strategies over free-form model output.
//!
//! [`grade`] is total: every failure inside a strategy (bad pattern,
//! unparseable JSON, malformed numeric target) becomes a zero score with a
//! `grade-error:` note. Unknown kinds score zero with note `unknown-kind`.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::domain::task::ScoringKind;

/// Score in `[0, 100]` plus a short diagnostic note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub score: f64,
    pub note: String,
}

impl Grade {
    pub fn new(score: f64, note: impl Into<String>) -> Self {
        Self {
            score,
            note: note.into(),
        }
    }

    fn binary(hit: bool, note: impl Into<String>) -> Self {
        Self::new(if hit { 100.0 } else { 0.0 }, note)
    }
}

#[derive(Debug, thiserror::Error)]
enum GradeError {
    #[error("invalid {side} json: {source}")]
    Json {
        side: &'static str,
        source: serde_json::Error,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid numeric target '{0}'")]
    NumericTarget(String),
}

/// Grade `got` against `expected` with the given strategy.
///
/// `prompt` is part of the grading contract but no current strategy reads it.
pub fn grade(_prompt: &str, expected: &str, got: &str, kind: &ScoringKind) -> Grade {
    let result = match kind {
        ScoringKind::Exact => Ok(Grade::binary(
            normalize(got) == normalize(expected),
            "exact",
        )),
        ScoringKind::ExactCase => Ok(Grade::binary(got == expected, "exact-case")),
        ScoringKind::Contains => Ok(Grade::binary(
            normalize(got).contains(&normalize(expected)),
            "contains",
        )),
        ScoringKind::Regex => grade_regex(expected, got),
        ScoringKind::JsonEqual => grade_json(expected, got),
        ScoringKind::Number => grade_number(expected, got),
        ScoringKind::Fuzzy => {
            let r = jaccard(expected, got);
            Ok(Grade::new(100.0 * r, format!("fuzzy={r:.3}")))
        }
        ScoringKind::Unsupported(_) => Ok(Grade::new(0.0, "unknown-kind")),
    };

    result.unwrap_or_else(|e| Grade::new(0.0, format!("grade-error:{e}")))
}

/// Collapse whitespace runs, trim and lower-case.
fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn grade_regex(pattern: &str, got: &str) -> Result<Grade, GradeError> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()?;
    let hit = re.is_match(got);
    Ok(Grade::binary(
        hit,
        if hit { "regex:hit" } else { "regex:miss" },
    ))
}

fn grade_json(expected: &str, got: &str) -> Result<Grade, GradeError> {
    let want: Value = serde_json::from_str(expected).map_err(|source| GradeError::Json {
        side: "expected",
        source,
    })?;
    let have: Value = serde_json::from_str(got).map_err(|source| GradeError::Json {
        side: "actual",
        source,
    })?;
    Ok(Grade::binary(json_equal(&want, &have), "json-equal"))
}

/// Structural equality where `1` and `1.0` are the same number.
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, xv)| ym.get(k).is_some_and(|yv| json_equal(xv, yv)))
        }
        _ => a == b,
    }
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[-+]?[0-9]*\.?[0-9]+").expect("numeric literal pattern is valid")
    })
}

/// `expected` is `value` or `value:tolerance`; any number in `got` within
/// tolerance of `value` is a hit.
fn grade_number(expected: &str, got: &str) -> Result<Grade, GradeError> {
    let mut parts = expected.split(':');
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| GradeError::NumericTarget(expected.to_string()))
    };
    let target = parse(parts.next().unwrap_or_default())?;
    let tolerance = match parts.next() {
        Some(t) => parse(t)?,
        None => 0.0,
    };

    let hit = number_pattern()
        .find_iter(got)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .any(|v| (v - target).abs() <= tolerance);
    Ok(Grade::binary(hit, format!("approx tol={tolerance}")))
}

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\w+").expect("word pattern is valid"))
}

fn token_set(s: &str) -> HashSet<String> {
    let lowered = s.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard similarity of lower-cased word sets. Two empty sets are
/// identical (1.0); one empty set against a non-empty one is 0.0.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let sa = token_set(a);
    let sb = token_set(b);
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    inter as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(kind: &str, expected: &str, got: &str) -> Grade {
        grade("prompt", expected, got, &ScoringKind::parse(kind))
    }

    #[test]
    fn exact_normalizes_whitespace_and_case() {
        assert_eq!(g("exact", "Hello  World", "  hello world\n").score, 100.0);
        assert_eq!(g("exact", "Hello", "Hello!").score, 0.0);
        assert_eq!(g("exact", "", "   ").score, 100.0);
    }

    #[test]
    fn exact_case_is_byte_exact() {
        assert_eq!(g("exact-case", "Paris", "Paris").score, 100.0);
        assert_eq!(g("exact-case", "Paris", "paris").score, 0.0);
        assert_eq!(g("exact-case", "Paris", "Paris ").note, "exact-case");
    }

    #[test]
    fn contains_and_substring_alias() {
        let hit = g("substring", "paris", "The capital is   PARIS, France.");
        assert_eq!(hit.score, 100.0);
        assert_eq!(hit.note, "contains");
        assert_eq!(g("contains", "lyon", "Paris").score, 0.0);
    }

    #[test]
    fn regex_is_case_insensitive_and_multiline() {
        let hit = g("re", r"^answer:\s*42$", "thinking...\nANSWER: 42\ndone");
        assert_eq!(hit.score, 100.0);
        assert_eq!(hit.note, "regex:hit");
        assert_eq!(g("regex", r"\d{3}", "12").note, "regex:miss");
    }

    #[test]
    fn bad_regex_is_grading_failure() {
        let bad = g("regex", "(unclosed", "anything");
        assert_eq!(bad.score, 0.0);
        assert!(bad.note.starts_with("grade-error:"), "note: {}", bad.note);
    }

    #[test]
    fn json_equal_is_structural() {
        assert_eq!(
            g("json", r#"{"a": 1, "b": [1, 2]}"#, r#"{"b":[1,2],"a":1.0}"#).score,
            100.0
        );
        assert_eq!(g("json-equal", r#"{"a": 1}"#, r#"{"a": 2}"#).score, 0.0);
        assert_eq!(g("json-equal", "[1,2]", "[2,1]").score, 0.0);
    }

    #[test]
    fn json_parse_failure_carries_error() {
        let bad = g("json-equal", r#"{"a": 1}"#, "not json");
        assert_eq!(bad.score, 0.0);
        assert!(bad.note.starts_with("grade-error:invalid actual json"));
    }

    #[test]
    fn number_with_tolerance() {
        assert_eq!(g("number", "3.14:0.01", "pi is about 3.1405").score, 100.0);
        assert_eq!(g("number", "3.14:0.01", "pi is 4").score, 0.0);
        assert_eq!(g("approx", "42", "the answer is 42.").score, 100.0);
        assert_eq!(g("number", "-5", "it dropped to -5 degrees").score, 100.0);
        assert_eq!(g("number", "7", "no digits here").score, 0.0);
    }

    #[test]
    fn number_with_bad_target_is_grading_failure() {
        let bad = g("number", "pi", "3.14");
        assert_eq!(bad.score, 0.0);
        assert!(bad.note.contains("invalid numeric target"));
    }

    #[test]
    fn fuzzy_is_jaccard_percent() {
        let half = g("fuzzy", "red green", "green blue red yellow");
        assert!((half.score - 50.0).abs() < 1e-9);
        assert_eq!(half.note, "fuzzy=0.500");
        assert_eq!(g("bleu", "a b", "B A").score, 100.0);
        assert_eq!(g("rouge", "a b", "c d").score, 0.0);
    }

    #[test]
    fn fuzzy_empty_sets() {
        assert_eq!(g("fuzzy", "", "").score, 100.0);
        assert_eq!(g("fuzzy", "...", "!!!").score, 100.0);
        assert_eq!(g("fuzzy", "", "word").score, 0.0);
    }

    #[test]
    fn unknown_kind_scores_zero() {
        let unknown = g("semantic-embedding", "x", "x");
        assert_eq!(unknown.score, 0.0);
        assert_eq!(unknown.note, "unknown-kind");
    }
}
