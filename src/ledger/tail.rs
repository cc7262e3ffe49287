//! Tail-Hash Reader
//!
//! Fetches the current chain tip from a bounded trailing window of the
//! ledger file instead of rescanning it.
//!
//! Any ambiguity (empty file, corrupt or truncated last line, missing or
//! malformed `entry_hash`) yields `GENESIS_HASH`. A damaged tail therefore
//! never blocks new appends; the resulting link is reported by a full
//! verify run. The damaged line is never repaired or truncated here.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use serde_json::Value;
use tracing::{debug, warn};

use crate::ledger::entry::{is_hex_hash, GENESIS_HASH};
use crate::ledger::lock::LockGuard;
use crate::ledger::Ledger;

impl Ledger {
    /// Hash of the most recent entry, or `GENESIS_HASH`
    pub fn latest_hash(&self) -> String {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return GENESIS_HASH.to_string(),
            Err(e) => {
                warn!("Cannot open ledger {:?} for tail read: {}", self.path, e);
                return GENESIS_HASH.to_string();
            }
        };

        let _guard = LockGuard::shared(self.locker(), &file);
        tail_hash_or_genesis(&mut &file, self.tail_window)
    }
}

/// Like [`read_tail_hash`], mapping I/O failures to `GENESIS_HASH`
pub fn tail_hash_or_genesis<R: Read + Seek>(reader: &mut R, window: u64) -> String {
    match read_tail_hash(reader, window) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Tail read failed, assuming genesis: {}", e);
            GENESIS_HASH.to_string()
        }
    }
}

/// Read the `entry_hash` of the last non-blank line.
///
/// Starts with a `window`-byte tail chunk and doubles it while the chunk
/// holds no complete final line, so oversized lines are still found.
pub fn read_tail_hash<R: Read + Seek>(reader: &mut R, window: u64) -> io::Result<String> {
    let size = reader.seek(SeekFrom::End(0))?;
    if size == 0 {
        return Ok(GENESIS_HASH.to_string());
    }

    let mut window = window.max(1);
    loop {
        let start = size.saturating_sub(window);
        reader.seek(SeekFrom::Start(start))?;

        let mut chunk = Vec::with_capacity((size - start) as usize);
        reader.by_ref().take(size - start).read_to_end(&mut chunk)?;

        let segments: Vec<&[u8]> = chunk.split(|b| *b == b'\n').collect();
        let last = segments
            .iter()
            .enumerate()
            .rev()
            .find(|(_, line)| !is_blank(line))
            .map(|(idx, line)| (idx, *line));

        match last {
            // first segment may begin mid-line
            Some((0, _)) | None if start > 0 => {
                window = window.saturating_mul(2);
            }
            Some((_, line)) => return Ok(hash_from_line(line)),
            None => return Ok(GENESIS_HASH.to_string()),
        }
    }
}

fn hash_from_line(line: &[u8]) -> String {
    let parsed: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => {
            warn!("Last ledger line is corrupt or partial ({}); chaining from genesis", e);
            return GENESIS_HASH.to_string();
        }
    };

    match parsed.get("entry_hash").and_then(Value::as_str) {
        Some(hash) if is_hex_hash(hash) => {
            debug!("Tail hash {}", hash);
            hash.to_string()
        }
        _ => {
            warn!("Last ledger line has no valid entry_hash; chaining from genesis");
            GENESIS_HASH.to_string()
        }
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}
