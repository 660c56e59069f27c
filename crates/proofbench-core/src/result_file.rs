//! Structured result files and line-delimited result logs.
//!
//! A result file holds either one record or an array of records. Missing
//! fields are defaulted on import, so partial producers stay readable. A
//! line-delimited log holds one JSON object per line; malformed lines are
//! skipped with a warning.

use serde::Serialize;
use serde_json::Value;
use std::io::Write as _;
use std::path::Path;
use tracing::{debug, warn};

use crate::domain::error::{BenchError, Result};
use crate::domain::trace::ResultRecord;

/// Parse result-file text into records; `origin` is for error messages.
pub fn parse_records(raw: &str, origin: &Path) -> Result<Vec<ResultRecord>> {
    let invalid = |reason: String| BenchError::ResultFile {
        path: origin.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
    let rows = match value {
        Value::Array(rows) => rows,
        single @ Value::Object(_) => vec![single],
        other => {
            return Err(invalid(format!(
                "expected an object or an array, got {}",
                json_kind(&other)
            )))
        }
    };

    rows.into_iter()
        .enumerate()
        .filter(|(index, row)| {
            let keep = row.is_object();
            if !keep {
                warn!(path = %origin.display(), record = index, "skipping non-object record");
            }
            keep
        })
        .map(|(index, row)| {
            ResultRecord::from_value(row).map_err(|e| invalid(format!("record {index}: {e}")))
        })
        .collect()
}

/// Read a structured result file.
pub fn read_records(path: &Path) -> Result<Vec<ResultRecord>> {
    let raw = std::fs::read_to_string(path).map_err(|e| BenchError::ResultFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_records(&raw, path)
}

/// Read a JSON array of rows for merging.
///
/// An unreadable file, invalid JSON or a non-array document yields an empty
/// list; a merge input is optional by nature.
pub fn read_rows_lenient(path: &Path) -> Vec<Value> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "merge input unreadable, treating as empty");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(rows)) => rows,
        Ok(other) => {
            warn!(path = %path.display(), kind = json_kind(&other), "merge input is not an array, treating as empty");
            Vec::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "merge input is not valid JSON, treating as empty");
            Vec::new()
        }
    }
}

/// Parse line-delimited JSON objects, skipping blank and malformed lines.
pub fn parse_jsonl(raw: &str, origin: &Path) -> Vec<Value> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str::<Value>(line) {
            Ok(row @ Value::Object(_)) => Some(row),
            Ok(_) => {
                warn!(path = %origin.display(), line = index + 1, "skipping non-object line");
                None
            }
            Err(e) => {
                warn!(path = %origin.display(), line = index + 1, error = %e, "skipping malformed line");
                None
            }
        })
        .collect()
}

/// Read a line-delimited log. A missing file is an empty log.
pub fn read_jsonl(path: &Path) -> Vec<Value> {
    match std::fs::read_to_string(path) {
        Ok(raw) => parse_jsonl(&raw, path),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "log unreadable, treating as empty");
            Vec::new()
        }
    }
}

/// Write one compact JSON document per line.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let file = std::fs::File::create(path).map_err(|e| BenchError::write(path, e))?;
    let mut out = std::io::BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n").map_err(|e| BenchError::write(path, e))?;
    }
    out.flush().map_err(|e| BenchError::write(path, e))?;
    Ok(())
}

/// Write a value as pretty-printed JSON with a trailing newline.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_text(path, &json)
}

/// Write text atomically (temp file in the same directory, then rename),
/// creating the parent directory first. Readers never see a partial file.
pub fn write_text(path: &Path, text: &str) -> Result<()> {
    let parent = ensure_parent(path)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| BenchError::write(path, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| BenchError::write(path, e))?;
    tmp.persist(path)
        .map_err(|e| BenchError::write(path, e.error))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<&Path> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| BenchError::write(parent, e))?;
            Ok(parent)
        }
        _ => Ok(Path::new(".")),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
