//! Concurrent Append Tests
//!
//! Many writers against one file must still produce a single linear chain

mod common;

use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use void_ledger::Ledger;

use common::temp_ledger;

const WRITERS: usize = 8;
const APPENDS_PER_WRITER: usize = 25;

#[test]
fn test_concurrent_appends_form_one_chain() {
    let (_dir, ledger) = temp_ledger();
    let path = ledger.path().to_path_buf();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // separate handle per writer, as separate processes would have
                let ledger = Ledger::new(path);
                barrier.wait();
                for i in 0..APPENDS_PER_WRITER {
                    ledger
                        .append("request", json!({"writer": writer, "seq": i}))
                        .expect("append failed");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer panicked");
    }

    let total = WRITERS * APPENDS_PER_WRITER;
    let result = ledger.verify().unwrap();
    assert!(result.is_valid, "{}", result.summary());
    assert_eq!(result.entry_count, total);

    let entries = ledger.read(None).unwrap();
    let prev_hashes: HashSet<&str> = entries.iter().map(|e| e.prev_hash.as_str()).collect();
    assert_eq!(prev_hashes.len(), total);
}

#[test]
fn test_readers_never_see_torn_lines() {
    let (_dir, ledger) = temp_ledger();
    let writer_ledger = ledger.clone();

    let writer = thread::spawn(move || {
        for i in 0..100 {
            writer_ledger
                .append("request", json!({"seq": i, "pad": "y".repeat(256)}))
                .expect("append failed");
        }
    });

    for _ in 0..20 {
        let result = ledger.verify().unwrap();
        assert!(result.is_valid, "{}", result.summary());
    }

    writer.join().expect("writer panicked");
    assert_eq!(ledger.verify().unwrap().entry_count, 100);
}
