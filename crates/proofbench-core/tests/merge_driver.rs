use serde_json::{json, Value};
use std::path::Path;

use proofbench_core::merge_files;

fn write(path: &Path, value: &Value) {
    std::fs::write(path, value.to_string()).expect("write fixture");
}

fn read(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("parse")
}

#[test]
fn three_way_merge_writes_back_to_ours() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (base, ours, theirs) = (
        dir.path().join("base.json"),
        dir.path().join("ours.json"),
        dir.path().join("theirs.json"),
    );
    write(&base, &json!([{"run_id": "a"}]));
    write(&ours, &json!([{"run_id": "a"}, {"run_id": "b"}]));
    write(&theirs, &json!([{"run_id": "b"}, {"run_id": "c"}]));

    let stats = merge_files(&base, &ours, &theirs).expect("merge");
    assert_eq!(stats.merged, 3);
    assert_eq!(stats.duplicates, 2);
    assert_eq!(
        read(&ours),
        json!([{"run_id": "a"}, {"run_id": "b"}, {"run_id": "c"}])
    );
    assert_eq!(read(&theirs), json!([{"run_id": "b"}, {"run_id": "c"}]));
}

#[test]
fn merging_a_log_with_itself_does_not_grow_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = json!([
        {"run_id": "p-20260101T000000Z-warm-up", "score": 81.0},
        {"profile": "p", "timestamp": "2026-01-01T00:00:00Z", "phase": "Strength", "score": 70.0},
        {"run_id": "p-20260101T000000Z-task-1", "got": "x", "ok": true}
    ]);
    let (base, ours, theirs) = (
        dir.path().join("base.json"),
        dir.path().join("ours.json"),
        dir.path().join("theirs.json"),
    );
    for path in [&base, &ours, &theirs] {
        write(path, &log);
    }

    merge_files(&base, &ours, &theirs).expect("merge");
    assert_eq!(read(&ours), log);

    merge_files(&base, &ours, &theirs).expect("merge again");
    assert_eq!(read(&ours), log);
}

#[test]
fn unreadable_inputs_count_as_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().join("missing.json");
    let ours = dir.path().join("ours.json");
    let theirs = dir.path().join("theirs.json");
    std::fs::write(&ours, "not json").expect("write");
    write(&theirs, &json!([{"run_id": "z"}, 3, "x"]));

    let stats = merge_files(&base, &ours, &theirs).expect("merge");
    assert_eq!(stats.discarded, 2);
    assert_eq!(read(&ours), json!([{"run_id": "z"}]));
}
