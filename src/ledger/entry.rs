//! Ledger Entry
//!
//! Defines the structure for hash-chained ledger entries. Each entry
//! embeds the hash of its predecessor and a SHA-256 digest over the
//! canonical encoding of its own hashed fields.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::ledger::canonical::canonical_hash;

/// `prev_hash` of the very first entry: 64 ASCII zeros.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One line of the ledger file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub ts_utc: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub data: Value,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl LedgerEntry {
    /// Build a new entry linked to `prev_hash`, assigning id, timestamp and hash
    pub fn new(entry_type: &str, data: Value, prev_hash: &str) -> LedgerResult<Self> {
        let mut entry = Self {
            id: Uuid::new_v4().to_string(),
            ts_utc: utc_timestamp(),
            entry_type: entry_type.to_string(),
            data,
            prev_hash: prev_hash.to_string(),
            entry_hash: String::new(),
        };

        entry.entry_hash = entry.calculate_hash()?;
        Ok(entry)
    }

    /// The hashed fields; `entry_hash` is excluded to avoid self-reference.
    pub fn hashed_payload(&self) -> Value {
        json!({
            "id": self.id,
            "ts_utc": self.ts_utc,
            "type": self.entry_type,
            "data": self.data,
            "prev_hash": self.prev_hash,
        })
    }

    /// Recompute the SHA-256 hash of this entry's canonical payload
    pub fn calculate_hash(&self) -> LedgerResult<String> {
        canonical_hash(&self.hashed_payload())
    }

    /// Check the stored hash against a fresh recomputation
    pub fn verify_hash(&self) -> bool {
        matches!(self.calculate_hash(), Ok(hash) if hash == self.entry_hash)
    }

    pub fn is_genesis_linked(&self) -> bool {
        self.prev_hash == GENESIS_HASH
    }

    /// Serialize as a single newline-terminated JSONL record
    pub fn to_line(&self) -> LedgerResult<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "{}: {} at {} ({}..)",
            self.entry_type,
            self.id,
            self.ts_utc,
            self.entry_hash.chars().take(12).collect::<String>()
        )
    }
}

/// Current UTC time at second precision, e.g. `2024-05-01T12:00:00Z`
pub fn utc_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// True for a 64-character hex digest
pub fn is_hex_hash(candidate: &str) -> bool {
    candidate.len() == 64 && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}
