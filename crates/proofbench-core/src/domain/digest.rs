//! Content hashing: canonical JSON fingerprints and file checksums.

use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::domain::error::{BenchError, Result};

const CHUNK_SIZE: usize = 1024 * 1024;

/// Rebuild `value` with sorted object keys and integer-valued floats
/// collapsed to integers. Rejects NaN/Infinity.
pub fn canonicalize(value: &Value) -> Result<Value> {
    Ok(match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key])?);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(canonicalize).collect::<Result<Vec<_>>>()?)
        }
        Value::Number(n) if n.is_f64() => {
            let f = n.as_f64().ok_or(BenchError::NonFiniteNumber)?;
            if !f.is_finite() {
                return Err(BenchError::NonFiniteNumber);
            }
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Value::Number(Number::from(f as i64))
            } else {
                Value::Number(n.clone())
            }
        }
        other => other.clone(),
    })
}

/// Compact canonical JSON text.
pub fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&canonicalize(value)?)?)
}

/// SHA-256 of the canonical JSON form, so reformatting a config file does
/// not change its fingerprint.
pub fn fingerprint(value: &Value) -> Result<String> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// SHA-256 hex digest of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of a file, streamed in 1 MiB chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_fingerprint() {
        let a = json!({"profiles": {"x": {"seed": 1, "budget_usd": 10.0}}, "results_dir": "r"});
        let b = json!({"results_dir": "r", "profiles": {"x": {"budget_usd": 10, "seed": 1}}});
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn value_change_changes_fingerprint() {
        let a = json!({"seed": 1});
        let b = json!({"seed": 2});
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn integer_valued_float_collapses() {
        assert_eq!(canonical_json(&json!({"v": 3.0})).unwrap(), r#"{"v":3}"#);
        assert_eq!(canonical_json(&json!({"v": 3.5})).unwrap(), r#"{"v":3.5}"#);
    }

    #[test]
    fn arrays_keep_order() {
        assert_ne!(
            canonical_json(&json!([1, 2])).unwrap(),
            canonical_json(&json!([2, 1])).unwrap()
        );
    }

    #[test]
    fn file_digest_matches_bytes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, b"proof").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_hex(b"proof"));
        assert_eq!(sha256_hex(b"").len(), 64);
    }
}
