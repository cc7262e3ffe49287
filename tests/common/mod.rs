#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use void_ledger::{Ledger, LedgerEntry};

/// Fresh ledger in its own temporary directory
pub fn temp_ledger() -> (TempDir, Ledger) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let ledger = Ledger::new(dir.path().join("void_ledger.jsonl"));
    (dir, ledger)
}

/// Append `count` request entries with payload `{"msg": "hello-<i>", "index": i}`
pub fn seed(ledger: &Ledger, count: usize) -> Vec<LedgerEntry> {
    (1..=count)
        .map(|i| {
            ledger
                .append("request", json!({"msg": format!("hello-{}", i), "index": i}))
                .expect("Failed to append entry")
        })
        .collect()
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("Failed to read ledger")
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn write_lines(path: &Path, lines: &[String]) {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content).expect("Failed to write ledger");
}
